//! svc - command-line client for the svc suite.
//!
//! See [`svc_client::cli`] for usage.

fn main() -> anyhow::Result<()> {
    svc_client::cli::main()
}
