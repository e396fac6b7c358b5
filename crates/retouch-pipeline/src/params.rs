//! The parameter vector: twelve named, clamped adjustment settings.
//!
//! Every value that enters the pipeline goes through [`Adjustment::clamp`],
//! whether it was constructed in code, parsed from CLI flags, or
//! deserialized from a client request. Deserialization is lenient in
//! the way a slider UI needs:
//!
//! - unknown keys are ignored,
//! - missing keys keep the per-key default (never zero),
//! - numeric strings (`"120"`) are accepted alongside numbers,
//! - fractional values are rounded to the nearest integer,
//! - out-of-range values are clamped rather than rejected,
//! - values that are not numeric are treated as missing.

use std::fmt;

use serde::de::{IgnoredAny, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One of the twelve named adjustments.
///
/// The declaration order here is the storage order inside
/// [`ParameterVector`], not the pipeline order (see
/// [`crate::pipeline::OPERATORS`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Adjustment {
    /// Additive brightness offset.
    Brightness,
    /// Contrast in percent around the mid-gray point.
    Contrast,
    /// Gamma in hundredths (100 = linear).
    Gamma,
    /// Input value mapped to black.
    BlackLevel,
    /// Input value mapped to white.
    WhiteLevel,
    /// Local contrast strength (3 = neutral).
    LocalContrast,
    /// Blur kernel size (1 = off).
    Blur,
    /// Tone curve strength (10 = neutral).
    ToneCurve,
    /// Shadow lift in percent.
    Shadows,
    /// Highlight compression in percent.
    Highlights,
    /// Fine sharpening amount in percent.
    Sharpen1,
    /// Coarse sharpening amount in percent.
    Sharpen2,
}

impl Adjustment {
    /// All adjustments in storage order.
    pub const ALL: [Self; 12] = [
        Self::Brightness,
        Self::Contrast,
        Self::Gamma,
        Self::BlackLevel,
        Self::WhiteLevel,
        Self::LocalContrast,
        Self::Blur,
        Self::ToneCurve,
        Self::Shadows,
        Self::Highlights,
        Self::Sharpen1,
        Self::Sharpen2,
    ];

    /// Canonical wire key.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Brightness => "brightness",
            Self::Contrast => "contrast",
            Self::Gamma => "gamma",
            Self::BlackLevel => "black_level",
            Self::WhiteLevel => "white_level",
            Self::LocalContrast => "local_contrast",
            Self::Blur => "blur",
            Self::ToneCurve => "tone_curve",
            Self::Shadows => "shadows",
            Self::Highlights => "highlights",
            Self::Sharpen1 => "sharpen1",
            Self::Sharpen2 => "sharpen2",
        }
    }

    /// Additional keys accepted on input.
    ///
    /// Besides the short forms, this covers the slider labels the
    /// bundled browser client sends as keys, Persian labels included.
    #[must_use]
    pub const fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Brightness => &["روشنایی"],
            Self::Contrast => &["کنتراست"],
            Self::Gamma => &["گاما"],
            Self::BlackLevel => &["black", "سطح سیاه"],
            Self::WhiteLevel => &["white", "سطح سفید"],
            Self::LocalContrast => &["Local Contrast"],
            Self::Blur => &["Blur"],
            Self::ToneCurve => &["Gamma / Tone Curve"],
            Self::Shadows => &["Shadows"],
            Self::Highlights => &["Highlights"],
            Self::Sharpen1 => &["sharp", "تیزی"],
            Self::Sharpen2 => &["sharp2", "تیزی۲"],
        }
    }

    /// Look up an adjustment by canonical key or alias.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|adj| adj.key() == key || adj.aliases().contains(&key))
    }

    /// Inclusive lower bound.
    #[must_use]
    pub const fn min(self) -> i32 {
        match self {
            Self::Brightness => -100,
            Self::Contrast => 50,
            Self::Gamma => 10,
            Self::BlackLevel => -250,
            Self::WhiteLevel | Self::Sharpen1 | Self::Sharpen2 => 0,
            Self::LocalContrast | Self::Blur => 1,
            Self::ToneCurve => 5,
            Self::Shadows | Self::Highlights => -50,
        }
    }

    /// Inclusive upper bound.
    #[must_use]
    pub const fn max(self) -> i32 {
        match self {
            Self::Brightness => 100,
            Self::Contrast | Self::Gamma | Self::Sharpen1 | Self::Sharpen2 => 300,
            Self::BlackLevel => 250,
            Self::WhiteLevel => 255,
            Self::LocalContrast => 10,
            Self::Blur => 50,
            Self::ToneCurve => 25,
            Self::Shadows | Self::Highlights => 50,
        }
    }

    /// Default value. Every default is also the operator's neutral
    /// value, so the default vector renders the source unchanged.
    #[must_use]
    pub const fn default_value(self) -> i32 {
        match self {
            Self::Brightness
            | Self::BlackLevel
            | Self::Shadows
            | Self::Highlights
            | Self::Sharpen1
            | Self::Sharpen2 => 0,
            Self::Contrast | Self::Gamma => 100,
            Self::WhiteLevel => 255,
            Self::LocalContrast => 3,
            Self::Blur => 1,
            Self::ToneCurve => 10,
        }
    }

    /// Clamp `value` into `[min, max]`.
    #[must_use]
    pub const fn clamp(self, value: i32) -> i32 {
        if value < self.min() {
            self.min()
        } else if value > self.max() {
            self.max()
        } else {
            value
        }
    }

    /// Clamp an arbitrary float, rounding to the nearest integer.
    ///
    /// Returns `None` for NaN and infinities.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn clamp_f64(self, value: f64) -> Option<i32> {
        if !value.is_finite() {
            return None;
        }
        let rounded = value
            .round()
            .clamp(f64::from(self.min()), f64::from(self.max()));
        // In range of i32 after the clamp above.
        Some(rounded as i32)
    }

    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Adjustment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A fully clamped set of adjustment values.
///
/// Fields are private: the only ways to build or modify a vector go
/// through [`Adjustment::clamp`], so an out-of-range vector cannot
/// exist. Equality and hashing are structural, which lets the vector
/// key a render cache.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParameterVector {
    values: [i32; 12],
}

impl Default for ParameterVector {
    fn default() -> Self {
        Self {
            values: Adjustment::ALL.map(Adjustment::default_value),
        }
    }
}

impl ParameterVector {
    /// The value of one adjustment.
    #[must_use]
    pub const fn get(&self, adjustment: Adjustment) -> i32 {
        self.values[adjustment.index()]
    }

    /// Set one adjustment, clamping to its range.
    pub const fn set(&mut self, adjustment: Adjustment, value: i32) {
        self.values[adjustment.index()] = adjustment.clamp(value);
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub const fn with(mut self, adjustment: Adjustment, value: i32) -> Self {
        self.set(adjustment, value);
        self
    }

    /// Whether `adjustment` is at its default (neutral) value.
    #[must_use]
    pub const fn is_default(&self, adjustment: Adjustment) -> bool {
        self.get(adjustment) == adjustment.default_value()
    }

    /// Adjustments whose value differs from the default.
    pub fn changed(&self) -> impl Iterator<Item = (Adjustment, i32)> + '_ {
        Adjustment::ALL
            .into_iter()
            .filter(|adj| !self.is_default(*adj))
            .map(|adj| (adj, self.get(adj)))
    }

    /// Build a vector from `(key, value)` pairs with the same leniency
    /// as deserialization: unknown keys and non-finite values are
    /// skipped, everything else is rounded and clamped.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut params = Self::default();
        for (key, value) in entries {
            if let Some(adj) = Adjustment::from_key(key)
                && let Some(v) = adj.clamp_f64(value)
            {
                params.set(adj, v);
            }
        }
        params
    }
}

impl fmt::Debug for ParameterVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for adj in Adjustment::ALL {
            map.entry(&adj.key(), &self.get(adj));
        }
        map.finish()
    }
}

impl Serialize for ParameterVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Adjustment::ALL.len()))?;
        for adj in Adjustment::ALL {
            map.serialize_entry(adj.key(), &self.get(adj))?;
        }
        map.end()
    }
}

/// A single incoming value before validation.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawValue {
    Number(f64),
    Text(String),
    Other(IgnoredAny),
}

impl RawValue {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Other(_) => None,
        }
    }
}

struct ParameterVectorVisitor;

impl<'de> Visitor<'de> for ParameterVectorVisitor {
    type Value = ParameterVector;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a map of adjustment names to numbers")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut params = ParameterVector::default();
        while let Some(key) = access.next_key::<String>()? {
            let Some(adj) = Adjustment::from_key(&key) else {
                access.next_value::<IgnoredAny>()?;
                continue;
            };
            let raw = access.next_value::<RawValue>()?;
            if let Some(v) = raw.as_f64().and_then(|n| adj.clamp_f64(n)) {
                params.set(adj, v);
            }
        }
        Ok(params)
    }
}

impl<'de> Deserialize<'de> for ParameterVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(ParameterVectorVisitor)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let p = ParameterVector::default();
        assert_eq!(p.get(Adjustment::Brightness), 0);
        assert_eq!(p.get(Adjustment::Contrast), 100);
        assert_eq!(p.get(Adjustment::Gamma), 100);
        assert_eq!(p.get(Adjustment::BlackLevel), 0);
        assert_eq!(p.get(Adjustment::WhiteLevel), 255);
        assert_eq!(p.get(Adjustment::LocalContrast), 3);
        assert_eq!(p.get(Adjustment::Blur), 1);
        assert_eq!(p.get(Adjustment::ToneCurve), 10);
        assert_eq!(p.get(Adjustment::Shadows), 0);
        assert_eq!(p.get(Adjustment::Highlights), 0);
        assert_eq!(p.get(Adjustment::Sharpen1), 0);
        assert_eq!(p.get(Adjustment::Sharpen2), 0);
        assert_eq!(p.changed().count(), 0);
    }

    #[test]
    fn every_default_is_within_range() {
        for adj in Adjustment::ALL {
            let d = adj.default_value();
            assert!(adj.min() <= d && d <= adj.max(), "{adj} default {d}");
        }
    }

    #[test]
    fn set_clamps_both_ends() {
        let p = ParameterVector::default()
            .with(Adjustment::Brightness, 500)
            .with(Adjustment::Contrast, 0);
        assert_eq!(p.get(Adjustment::Brightness), 100);
        assert_eq!(p.get(Adjustment::Contrast), 50);
    }

    #[test]
    fn keys_round_trip_through_from_key() {
        for adj in Adjustment::ALL {
            assert_eq!(Adjustment::from_key(adj.key()), Some(adj));
        }
        assert_eq!(Adjustment::from_key("sharp"), Some(Adjustment::Sharpen1));
        assert_eq!(Adjustment::from_key("black"), Some(Adjustment::BlackLevel));
        assert_eq!(Adjustment::from_key("saturation"), None);
    }

    #[test]
    fn missing_keys_fall_back_to_defaults_not_zero() {
        let p: ParameterVector = serde_json::from_str(r#"{"brightness": 10}"#).unwrap();
        assert_eq!(p.get(Adjustment::Brightness), 10);
        assert_eq!(p.get(Adjustment::Contrast), 100);
        assert_eq!(p.get(Adjustment::WhiteLevel), 255);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"vibrance": 40, "nested": {"a": [1, 2]}, "gamma": 150}"#)
                .unwrap();
        assert_eq!(p, ParameterVector::default().with(Adjustment::Gamma, 150));
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"brightness": 500, "sharpen2": -3}"#).unwrap();
        assert_eq!(p.get(Adjustment::Brightness), 100);
        assert_eq!(p.get(Adjustment::Sharpen2), 0);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"contrast": "120", "shadows": " -7 "}"#).unwrap();
        assert_eq!(p.get(Adjustment::Contrast), 120);
        assert_eq!(p.get(Adjustment::Shadows), -7);
    }

    #[test]
    fn fractional_values_round() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"brightness": 10.6, "gamma": "99.4"}"#).unwrap();
        assert_eq!(p.get(Adjustment::Brightness), 11);
        assert_eq!(p.get(Adjustment::Gamma), 99);
    }

    #[test]
    fn non_numeric_values_are_treated_as_missing() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"contrast": "lots", "blur": null, "gamma": [1]}"#).unwrap();
        assert_eq!(p, ParameterVector::default());
    }

    #[test]
    fn aliases_are_accepted() {
        let p: ParameterVector =
            serde_json::from_str(r#"{"sharp": 40, "black": 12, "white": 200}"#).unwrap();
        assert_eq!(p.get(Adjustment::Sharpen1), 40);
        assert_eq!(p.get(Adjustment::BlackLevel), 12);
        assert_eq!(p.get(Adjustment::WhiteLevel), 200);
    }

    #[test]
    fn slider_labels_are_accepted() {
        let p: ParameterVector = serde_json::from_str(
            r#"{
                "روشنایی": "25",
                "کنتراست": "150",
                "گاما": "80",
                "سطح سیاه": "10",
                "سطح سفید": "240",
                "Local Contrast": "6",
                "Blur": "7",
                "Gamma / Tone Curve": "14",
                "Shadows": "20",
                "Highlights": "-15",
                "تیزی": "120",
                "تیزی۲": "60"
            }"#,
        )
        .unwrap();
        let expected = [
            (Adjustment::Brightness, 25),
            (Adjustment::Contrast, 150),
            (Adjustment::Gamma, 80),
            (Adjustment::BlackLevel, 10),
            (Adjustment::WhiteLevel, 240),
            (Adjustment::LocalContrast, 6),
            (Adjustment::Blur, 7),
            (Adjustment::ToneCurve, 14),
            (Adjustment::Shadows, 20),
            (Adjustment::Highlights, -15),
            (Adjustment::Sharpen1, 120),
            (Adjustment::Sharpen2, 60),
        ];
        for (adj, value) in expected {
            assert_eq!(p.get(adj), value, "{adj}");
        }
    }

    #[test]
    fn every_alias_resolves_to_its_own_adjustment() {
        for adj in Adjustment::ALL {
            for alias in adj.aliases() {
                assert_eq!(Adjustment::from_key(alias), Some(adj), "{alias}");
            }
        }
    }

    #[test]
    fn serializes_every_key() {
        let json = serde_json::to_value(ParameterVector::default()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 12);
        assert_eq!(obj["white_level"], 255);
        let back: ParameterVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, ParameterVector::default());
    }

    #[test]
    fn non_map_input_is_rejected() {
        assert!(serde_json::from_str::<ParameterVector>("[1, 2, 3]").is_err());
    }

    #[test]
    fn from_entries_skips_non_finite() {
        let p = ParameterVector::from_entries([
            ("brightness", f64::NAN),
            ("contrast", 1e12),
            ("bogus", 3.0),
        ]);
        assert_eq!(p.get(Adjustment::Brightness), 0);
        assert_eq!(p.get(Adjustment::Contrast), 300);
    }

    #[test]
    fn changed_lists_non_default_values() {
        let p = ParameterVector::default()
            .with(Adjustment::Blur, 5)
            .with(Adjustment::Sharpen2, 50);
        let changed: Vec<_> = p.changed().collect();
        assert_eq!(
            changed,
            vec![(Adjustment::Blur, 5), (Adjustment::Sharpen2, 50)]
        );
    }
}
