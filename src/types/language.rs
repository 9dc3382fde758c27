//! Response language and the locale-specific placeholder strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Language used for prompts, placeholders and disclaimers.
///
/// Parsed leniently from locale codes: `"ko"`, `"ko-KR"`, `"ko_KR"` and
/// `"KO"` are all Korean. Anything unrecognised is English.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Korean,
    Japanese,
    Chinese,
}

impl Language {
    pub fn from_code(code: &str) -> Self {
        let primary = code
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match primary.as_str() {
            "ko" | "korean" => Language::Korean,
            "ja" | "japanese" => Language::Japanese,
            "zh" | "chinese" => Language::Chinese,
            _ => Language::English,
        }
    }

    /// ISO 639-1 code.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Korean => "ko",
            Language::Japanese => "ja",
            Language::Chinese => "zh",
        }
    }

    /// Name of the language as written in prompts.
    pub fn display_name(self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Korean => "Korean",
            Language::Japanese => "Japanese",
            Language::Chinese => "Chinese",
        }
    }

    pub fn unknown_food(self) -> &'static str {
        match self {
            Language::English => "Unidentified meal",
            Language::Korean => "알 수 없는 음식",
            Language::Japanese => "不明な料理",
            Language::Chinese => "未识别的餐食",
        }
    }

    pub fn default_serving(self) -> &'static str {
        match self {
            Language::English => "1 serving",
            Language::Korean => "1인분",
            Language::Japanese => "1人前",
            Language::Chinese => "1份",
        }
    }

    pub fn unknown_cooking_method(self) -> &'static str {
        match self {
            Language::English => "Unknown",
            Language::Korean => "알 수 없음",
            Language::Japanese => "不明",
            Language::Chinese => "未知",
        }
    }

    /// Disclaimer attached to synthetic analyses.
    pub fn fallback_disclaimer(self) -> &'static str {
        match self {
            Language::English => {
                "These values are rough estimates because the meal could not be analyzed. \
                 Please check them before relying on them for dietary decisions."
            }
            Language::Korean => {
                "음식을 정확히 분석하지 못해 추정값을 표시합니다. \
                 식단 결정에 활용하기 전에 수치를 확인해 주세요."
            }
            Language::Japanese => {
                "料理を正確に分析できなかったため、推定値を表示しています。\
                 食事の判断に使う前に数値をご確認ください。"
            }
            Language::Chinese => {
                "未能准确分析该餐食，以下为估算值。请在用于饮食决策前核实这些数值。"
            }
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_code(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_region_tagged_codes() {
        assert_eq!(Language::from_code("ko-KR"), Language::Korean);
        assert_eq!(Language::from_code("ja_JP"), Language::Japanese);
        assert_eq!(Language::from_code("ZH"), Language::Chinese);
    }

    #[test]
    fn unknown_codes_default_to_english() {
        assert_eq!(Language::from_code("fr"), Language::English);
        assert_eq!(Language::from_code(""), Language::English);
    }

    #[test]
    fn code_round_trips() {
        for lang in [
            Language::English,
            Language::Korean,
            Language::Japanese,
            Language::Chinese,
        ] {
            assert_eq!(Language::from_code(lang.code()), lang);
        }
    }
}
