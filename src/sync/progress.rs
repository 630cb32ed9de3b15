use indicatif::ProgressStyle;

/// Spinner shown while a repository is being processed.
pub fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m{spinner}\x1b[0m {wide_msg}")
        .unwrap()
        .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"])
}

/// Repository mirrored (cloned, fetched or re-cloned).
pub fn ok_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[32m✔\x1b[0m {wide_msg}").unwrap()
}

/// Repository left untouched, e.g. its remote could not be reached.
pub fn skip_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[33m–\x1b[0m {wide_msg}").unwrap()
}

/// Processing stopped on an error.
pub fn err_style() -> ProgressStyle {
    ProgressStyle::with_template("\x1b[31m✘\x1b[0m {wide_msg}").unwrap()
}
