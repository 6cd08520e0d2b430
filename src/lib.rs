pub mod cli;
pub mod config;
pub mod console;
pub mod error;
pub mod gateway;
pub mod identity;
pub mod pipeline;
pub mod registry;
pub mod views;

pub use config::ConsoleConfig;
pub use console::Console;
pub use error::{ConsoleError, ConsoleResult};

// Test-only printing helper: expands to eprintln! during tests and is absent otherwise.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In non-test builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
