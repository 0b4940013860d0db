/// `&'static Selector` compiled on first use.  The argument is usually one
/// of the parsers' selector constants, e.g. `selector!(GRAPH)`.
///
/// Panics on first use if the selector is invalid.
#[macro_export]
macro_rules! selector {
    ($css: expr) => {{
        static COMPILED: ::once_cell::sync::Lazy<::scraper::Selector> =
            ::once_cell::sync::Lazy::new(|| ::scraper::Selector::parse($css).unwrap());
        &*COMPILED
    }};
}

/// `&'static Regex` compiled on first use, for cleaning scraped text.
#[macro_export]
macro_rules! regex {
    ($pattern: expr) => {{
        static COMPILED: ::once_cell::sync::Lazy<::regex::Regex> =
            ::once_cell::sync::Lazy::new(|| ::regex::Regex::new($pattern).unwrap());
        &*COMPILED
    }};
}
