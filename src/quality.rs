//! Quality tiers and the parameters they resolve to.

use std::fmt;

/// Named compression preset chosen by the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityTier {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityTier {
    /// Exact tier name after trimming whitespace, or `None`
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "low" => Some(QualityTier::Low),
            "medium" => Some(QualityTier::Medium),
            "high" => Some(QualityTier::High),
            _ => None,
        }
    }

    /// Resolve a user-supplied tier name. Never fails: unknown names fall back to `Medium`.
    pub fn resolve(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    pub fn settings(self) -> QualitySettings {
        QualitySettings::for_tier(self)
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        };
        f.write_str(name)
    }
}

/// Concrete parameters for one compression run
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySettings {
    /// Object garbage collection aggressiveness (0-4)
    pub garbage_level: u8,
    /// JPEG quality used when re-encoding images (1-100)
    pub image_quality: u8,
    /// Scale applied to both image dimensions, in (0, 1]
    pub resize_factor: f64,
}

impl QualitySettings {
    pub fn for_tier(tier: QualityTier) -> Self {
        match tier {
            QualityTier::Low => QualitySettings {
                garbage_level: 4,
                image_quality: 50,
                resize_factor: 0.50,
            },
            QualityTier::Medium => QualitySettings {
                garbage_level: 3,
                image_quality: 75,
                resize_factor: 0.70,
            },
            QualityTier::High => QualitySettings {
                garbage_level: 2,
                image_quality: 90,
                resize_factor: 0.85,
            },
        }
    }
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::for_tier(QualityTier::default())
    }
}

/// Map a tier name straight to its settings
pub fn resolve(name: &str) -> QualitySettings {
    QualityTier::resolve(name).settings()
}
