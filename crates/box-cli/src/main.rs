//! # boxd - box queue server

fn main() {
    std::process::exit(box_cli::cli::server::run());
}
