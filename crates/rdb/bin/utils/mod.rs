use eyre::EyreHandler;
use std::error::Error;
use tracing_error::ErrorLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use yansi::Paint;

/// Error report printed by `rdb` when `RDB_DEBUG` is unset.
///
/// Shows the failing operation in red, followed by its causes one per line, innermost last.
/// Replay errors nest deeply (e.g. a finalize failure wrapping a table error wrapping an i/o
/// error), so every level is numbered when there is more than one.
#[derive(Debug)]
struct Handler;

impl EyreHandler for Handler {
    fn debug(
        &self,
        error: &(dyn Error + 'static),
        f: &mut core::fmt::Formatter<'_>,
    ) -> core::fmt::Result {
        if f.alternate() {
            return core::fmt::Debug::fmt(error, f);
        }
        write!(f, "\n{}", error.red())?;

        let causes: Vec<_> = std::iter::successors(error.source(), |&e: &&(dyn Error + 'static)| e.source()).collect();
        match causes.as_slice() {
            [] => {}
            [cause] => write!(f, "\n\nCaused by: {cause}")?,
            causes => {
                write!(f, "\n\nCaused by:")?;
                for (n, cause) in causes.iter().enumerate() {
                    write!(f, "\n  {}. {cause}", n + 1)?;
                }
            }
        }

        Ok(())
    }
}

/// Installs the global error report and panic hooks.
///
/// With `RDB_DEBUG` set, `color-eyre` reports errors with span traces and backtraces.
/// Otherwise errors go through [`Handler`] and panics through a `color-eyre` panic hook.
pub fn install_error_handler() {
    // If the user has not explicitly overridden "RUST_BACKTRACE", then produce full backtraces.
    if std::env::var_os("RUST_BACKTRACE").is_none() {
        std::env::set_var("RUST_BACKTRACE", "full");
    }

    let debug_enabled = std::env::var("RDB_DEBUG").is_ok();
    if debug_enabled {
        if let Err(e) = color_eyre::install() {
            warn!("failed to install color eyre error hook: {e}");
        }
    } else {
        let (panic_hook, _) = color_eyre::config::HookBuilder::default()
            .panic_section("This is a bug. Consider reporting it to the RDB maintainers.")
            .into_hooks();
        panic_hook.install();
        if let Err(e) = eyre::set_hook(Box::new(move |_| Box::new(Handler))) {
            warn!("failed to install eyre error hook: {e}");
        }
    }
}

/// Initializes a tracing Subscriber for logging.
///
/// Engine output replayed through the instrumentation sink is logged under the `rdb::engine`
/// target, e.g. `RUST_LOG=rdb::engine=trace`.
pub fn subscriber() {
    tracing_subscriber::Registry::default()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init()
}

/// Sets the default [`yansi`] color output condition.
pub fn enable_paint() {
    let enable = yansi::Condition::os_support() && yansi::Condition::tty_and_color_live();
    yansi::whenever(yansi::Condition::cached(enable));
}

#[cfg(test)]
mod tests {
    use std::{fmt, io};

    use super::*;

    #[derive(Debug)]
    struct Wrapped(&'static str, Box<dyn Error + 'static>);

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Error for Wrapped {
        fn source(&self) -> Option<&(dyn Error + 'static)> {
            Some(self.1.as_ref())
        }
    }

    struct Rendered<'a>(&'a (dyn Error + 'static));

    impl fmt::Debug for Rendered<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            Handler.debug(self.0, f)
        }
    }

    #[test]
    fn handler_renders_single_cause_inline() {
        yansi::disable();
        let err = Wrapped(
            "failed to persist the register cache",
            Box::new(io::Error::other("disk full")),
        );
        assert_eq!(
            format!("{:?}", Rendered(&err)),
            "\nfailed to persist the register cache\n\nCaused by: disk full"
        );
    }

    #[test]
    fn handler_numbers_nested_causes() {
        yansi::disable();
        let err = Wrapped(
            "replay failed",
            Box::new(Wrapped("failed to write table", Box::new(io::Error::other("disk full")))),
        );
        assert_eq!(
            format!("{:?}", Rendered(&err)),
            "\nreplay failed\n\nCaused by:\n  1. failed to write table\n  2. disk full"
        );
    }
}
