mod cli;
mod cluster;
mod config;
mod consts;
mod daemon;
mod ext;
mod inventory;
mod job;
mod registry;
mod scanner;
mod sink;
#[cfg(test)]
mod testing;
mod shadow {
    #![allow(clippy::needless_raw_string_hashes)]
    use shadow_rs::shadow;
    shadow!(build);

    pub use self::build::*;
}

use self::cli::Cli;

fn main() {
    match Cli::default().run() {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
