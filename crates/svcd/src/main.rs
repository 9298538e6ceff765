//! svcd - port registry, session daemon and file transfer server.
//!
//! See [`svcd::cli`] for usage.

fn main() -> anyhow::Result<()> {
    svcd::cli::main()
}
