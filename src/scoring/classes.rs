use serde::{Deserialize, Serialize};

/// Ordered quality bands for an astro score. `Bad < Poor < ... < Excellent`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityClass {
    Bad,
    Poor,
    Average,
    Good,
    Excellent,
}

impl QualityClass {
    pub fn from_score(score: u8) -> Self {
        match score {
            85..=u8::MAX => QualityClass::Excellent,
            70..=84 => QualityClass::Good,
            50..=69 => QualityClass::Average,
            30..=49 => QualityClass::Poor,
            _ => QualityClass::Bad,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QualityClass::Excellent => "EXCELLENT",
            QualityClass::Good => "GOOD",
            QualityClass::Average => "AVERAGE",
            QualityClass::Poor => "POOR",
            QualityClass::Bad => "BAD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "EXCELLENT" => Some(QualityClass::Excellent),
            "GOOD" => Some(QualityClass::Good),
            "AVERAGE" => Some(QualityClass::Average),
            "POOR" => Some(QualityClass::Poor),
            "BAD" => Some(QualityClass::Bad),
            _ => None,
        }
    }
}

/// Display classification of seeing alone, in arcseconds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SeeingClass {
    Excellent,
    VeryGood,
    Good,
    Average,
    BelowAverage,
    Poor,
    Bad,
}

impl SeeingClass {
    pub fn from_arcsec(seeing_arcsec: f64) -> Self {
        if seeing_arcsec < 0.8 {
            SeeingClass::Excellent
        } else if seeing_arcsec < 1.2 {
            SeeingClass::VeryGood
        } else if seeing_arcsec < 1.5 {
            SeeingClass::Good
        } else if seeing_arcsec < 2.0 {
            SeeingClass::Average
        } else if seeing_arcsec < 2.5 {
            SeeingClass::BelowAverage
        } else if seeing_arcsec < 3.0 {
            SeeingClass::Poor
        } else {
            SeeingClass::Bad
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SeeingClass::Excellent => "Excellent (<0.8\")",
            SeeingClass::VeryGood => "Very Good (0.8-1.2\")",
            SeeingClass::Good => "Good (1.2-1.5\")",
            SeeingClass::Average => "Average (1.5-2.0\")",
            SeeingClass::BelowAverage => "Below Average (2.0-2.5\")",
            SeeingClass::Poor => "Poor (2.5-3.0\")",
            SeeingClass::Bad => "Bad (>3.0\")",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_bands_use_inclusive_lower_bounds() {
        assert_eq!(QualityClass::from_score(100), QualityClass::Excellent);
        assert_eq!(QualityClass::from_score(85), QualityClass::Excellent);
        assert_eq!(QualityClass::from_score(84), QualityClass::Good);
        assert_eq!(QualityClass::from_score(70), QualityClass::Good);
        assert_eq!(QualityClass::from_score(69), QualityClass::Average);
        assert_eq!(QualityClass::from_score(50), QualityClass::Average);
        assert_eq!(QualityClass::from_score(30), QualityClass::Poor);
        assert_eq!(QualityClass::from_score(29), QualityClass::Bad);
        assert_eq!(QualityClass::from_score(0), QualityClass::Bad);
    }

    #[test]
    fn quality_classes_are_ordered() {
        assert!(QualityClass::Bad < QualityClass::Poor);
        assert!(QualityClass::Good < QualityClass::Excellent);
    }

    #[test]
    fn quality_class_string_form_round_trips() {
        for class in [
            QualityClass::Bad,
            QualityClass::Poor,
            QualityClass::Average,
            QualityClass::Good,
            QualityClass::Excellent,
        ] {
            assert_eq!(QualityClass::parse(class.as_str()), Some(class));
        }
        assert_eq!(QualityClass::parse("excellent"), None);
    }

    #[test]
    fn seeing_bands() {
        assert_eq!(SeeingClass::from_arcsec(0.5), SeeingClass::Excellent);
        assert_eq!(SeeingClass::from_arcsec(0.8), SeeingClass::VeryGood);
        assert_eq!(SeeingClass::from_arcsec(1.49), SeeingClass::Good);
        assert_eq!(SeeingClass::from_arcsec(2.7), SeeingClass::Poor);
        assert_eq!(SeeingClass::from_arcsec(4.0), SeeingClass::Bad);
    }
}
