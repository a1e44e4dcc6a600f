use chrono::Local;
use std::fmt;

fn log(level: &str, args: fmt::Arguments) {
    let now = Local::now();
    println!("[{}] {} {}", now.format("%Y-%m-%d %H:%M:%S"), level, args);
}

pub fn info(args: fmt::Arguments) {
    log("INFO", args);
}

pub fn warn(args: fmt::Arguments) {
    log("WARN", args);
}

pub fn error(args: fmt::Arguments) {
    log("ERROR", args);
}

pub fn debug(args: fmt::Arguments) {
    if std::env::var_os("DATASCOPE_DEBUG").is_some() {
        log("DEBUG", args);
    }
}

#[macro_export]
macro_rules! info {
    ($($arg:tt)*) => {
        $crate::logger::info(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::logger::warn(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! error {
    ($($arg:tt)*) => {
        $crate::logger::error(format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug {
    ($($arg:tt)*) => {
        $crate::logger::debug(format_args!($($arg)*))
    };
}
