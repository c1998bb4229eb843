use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum Phase {
    Deploy,
    Validate,
}

const DEPLOY_CATEGORIES: &[Category] = &[
    Category::Skipped,
    Category::Failed,
    Category::Success,
    Category::ConnectFailed,
];

const VALIDATE_CATEGORIES: &[Category] = &[
    Category::ValidateFailed,
    Category::ValidateSuccess,
    Category::ConnectFailed,
];

impl Phase {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Phase::Deploy => "deploy",
            Phase::Validate => "validate",
        }
    }

    /// Every category an outcome of this phase can land in.
    pub(crate) fn categories(&self) -> &'static [Category] {
        match self {
            Phase::Deploy => DEPLOY_CATEGORIES,
            Phase::Validate => VALIDATE_CATEGORIES,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub(crate) enum Category {
    Skipped,
    Failed,
    Success,
    ValidateFailed,
    ValidateSuccess,
    ConnectFailed,
}

impl Category {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Category::Skipped => "SKIPPED",
            Category::Failed => "FAILED",
            Category::Success => "SUCCESS",
            Category::ValidateFailed => "VALIDATE_FAILED",
            Category::ValidateSuccess => "VALIDATE_SUCCESS",
            Category::ConnectFailed => "CONNECT_FAILED",
        }
    }

    /// Results that need no operator follow-up. A skipped deploy usually
    /// means the device already carries the change.
    pub(crate) fn is_clean(&self) -> bool {
        matches!(
            self,
            Category::Skipped | Category::Success | Category::ValidateSuccess
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
