use crate::utils::error::{CertError, Result};
use std::path::Path;
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// 收集所有設定問題，最後一次回報
#[derive(Debug, Default)]
pub struct Problems {
    items: Vec<String>,
}

impl Problems {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn check(&mut self, outcome: std::result::Result<(), String>) {
        if let Err(problem) = outcome {
            self.items.push(problem);
        }
    }

    pub fn push(&mut self, problem: impl Into<String>) {
        self.items.push(problem.into());
    }

    /// 其他模組回傳的設定錯誤併入清單
    pub fn absorb(&mut self, error: CertError) {
        match error {
            CertError::ConfigError { problems } => self.items.extend(problems),
            other => self.items.push(other.to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_result(self) -> Result<()> {
        if self.items.is_empty() {
            Ok(())
        } else {
            Err(CertError::config(self.items))
        }
    }
}

pub fn validate_url(field_name: &str, url_str: &str) -> std::result::Result<(), String> {
    if url_str.is_empty() {
        return Err(format!("{} cannot be empty", field_name));
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(format!(
                "{} has unsupported URL scheme: {}",
                field_name, scheme
            )),
        },
        Err(e) => Err(format!("{} is not a valid URL ({}): {}", field_name, e, url_str)),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> std::result::Result<(), String> {
    if path.is_empty() {
        return Err(format!("{} cannot be empty", field_name));
    }

    if path.contains('\0') {
        return Err(format!("{} contains null bytes", field_name));
    }

    Ok(())
}

pub fn validate_existing_dir(field_name: &str, path: &Path) -> std::result::Result<(), String> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(format!(
            "{} does not exist or is not a directory: {}",
            field_name,
            path.display()
        ))
    }
}

pub fn validate_existing_file(field_name: &str, path: &Path) -> std::result::Result<(), String> {
    if path.is_file() {
        Ok(())
    } else {
        Err(format!("{} not found: {}", field_name, path.display()))
    }
}

pub fn validate_required<'a>(
    field_name: &str,
    value: &'a Option<String>,
) -> std::result::Result<&'a str, String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("{} is not set", field_name)),
    }
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> std::result::Result<(), String> {
    if value < min || value > max {
        return Err(format!(
            "{} must be between {} and {} (got {})",
            field_name, min, max, value
        ));
    }
    Ok(())
}
