// Copyright (c) 2026 SOLARE S.R.O.
//
// This file is part of WattCard.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use std::fmt;

use thiserror::Error;

/// Supported display locales
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    /// English (default)
    #[default]
    English,
    /// Czech
    Czech,
}

impl Locale {
    /// Get the locale identifier string (e.g., "en", "cs")
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::English => "en",
            Self::Czech => "cs",
        }
    }

    /// Get the locale display name
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::English => "English",
            Self::Czech => "Čeština",
        }
    }

    /// List all supported locales
    pub const ALL: [Locale; 2] = [Locale::English, Locale::Czech];

    /// Parse locale from string code
    ///
    /// # Errors
    ///
    /// Returns `LocaleError::Unsupported` if the locale code is not supported.
    pub fn from_code(code: &str) -> Result<Self, LocaleError> {
        match code.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::English),
            "cs" | "czech" | "cz" => Ok(Self::Czech),
            _ => Err(LocaleError::Unsupported(code.to_owned())),
        }
    }

    fn group_separator(self) -> char {
        match self {
            Self::English => ',',
            // Czech groups with a non-breaking space
            Self::Czech => '\u{a0}',
        }
    }

    fn decimal_separator(self) -> char {
        match self {
            Self::English => '.',
            Self::Czech => ',',
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Locale {
    type Err = LocaleError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}

/// Locale errors
#[derive(Debug, Error)]
pub enum LocaleError {
    /// Unsupported locale
    #[error("Unsupported locale: {0}")]
    Unsupported(String),
}

/// Format `value` the way the host's default number formatter would: at most
/// three fraction digits with halves rounded away from zero, trailing
/// fraction zeros dropped, thousands grouped with the locale separator.
#[must_use]
pub fn format_number(value: f64, locale: Locale) -> String {
    let milli = (value.abs() * 1000.0).round() as u64;
    let whole = milli.div_euclid(1000);
    let fraction = milli.rem_euclid(1000);

    let digits = whole.to_string();
    let mut out = String::new();
    if value < 0.0 && milli > 0 {
        out.push('-');
    }
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index).is_multiple_of(3) {
            out.push(locale.group_separator());
        }
        out.push(digit);
    }
    if fraction > 0 {
        out.push(locale.decimal_separator());
        let padded = format!("{fraction:03}");
        out.push_str(padded.trim_end_matches('0'));
    }
    out
}
