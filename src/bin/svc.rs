//! svc - command-line client for the port registry, session daemon and
//! file transfer server.
//!
//! # Usage
//!
//! ```bash
//! svc prs lookup "SD Server"
//! echo hello | svc sd --open --post greeting
//! svc ft --dir docs --out ./fetched
//! ```

fn main() -> anyhow::Result<()> {
    svc_client::cli::main()
}
