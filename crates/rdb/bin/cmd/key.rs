use clap::{Parser, Subcommand};
use eyre::Result;
use rdb_backend::{ReadableKey, RegisterKey};
use yansi::Paint;

/// CLI arguments for `rdb key`.
#[derive(Clone, Debug, Parser)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub cmd: KeySubcommand,
}

#[derive(Clone, Debug, Subcommand)]
pub enum KeySubcommand {
    /// Render a raw register key in its readable form.
    Readable {
        /// The owner bytes, as hex.
        owner: String,
        /// The key bytes, as hex.
        key: String,
    },

    /// Decode a readable register key to its raw bytes.
    Mangled {
        /// The owner, as hex. The `0x` prefix is optional.
        owner: String,
        /// The key as shown in cache files and reports; slab keys are `$` followed by hex.
        key: String,
    },
}

impl KeyArgs {
    pub fn run(self) -> Result<()> {
        match self.cmd {
            KeySubcommand::Readable { owner, key } => {
                let key = RegisterKey::from_hex(&owner, &key)?;
                if !key.has_exact_readable() {
                    warn!("key is not valid UTF-8, the readable form is lossy");
                }
                println!("{}", readable(&key));
            }
            KeySubcommand::Mangled { owner, key } => {
                let key = ReadableKey::new(owner, key).to_mangled()?;
                println!("{}", mangled(&key));
            }
        }
        Ok(())
    }
}

fn readable(key: &RegisterKey) -> String {
    let kind = if key.is_slab() { "slab" } else { "register" };
    format!("{} {}", key.to_readable(), kind.dim())
}

fn mangled(key: &RegisterKey) -> String {
    format!("owner: {}\nkey:   {}", hex::encode_prefixed(&key.owner), hex::encode_prefixed(&key.key))
}
