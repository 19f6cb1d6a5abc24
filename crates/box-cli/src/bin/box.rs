//! # box - box queue client

fn main() {
    std::process::exit(box_cli::cli::client::run());
}
