//! svcd - port registry, session daemon and file transfer server.
//!
//! # Usage
//!
//! ```bash
//! svcd prs                       # port registry on UDP 30000
//! svcd sd --root ./site          # session daemon, advertised as "SD Server"
//! svcd ft --root ./shared        # file server, advertised as "FT Server"
//! ```

fn main() -> anyhow::Result<()> {
    svcd::cli::main()
}
