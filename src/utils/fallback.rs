#![forbid(unsafe_code)]

use anyhow::Result;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::utils::errors::Errors;
use crate::utils::haiku_types::{HaikuLines, HAIKU_LINES};

// ***************************************************************************
//                                Constants
// ***************************************************************************
// Key of the poem used for unregistered themes.
pub const DEFAULT_THEME: &str = "默认";

/// One canned poem, one entry per line.
pub type Poem = &'static [&'static str];

/// All registered variants of a theme.
#[derive(Debug)]
pub struct ThemePoems {
    pub theme: &'static str,
    pub poems: &'static [Poem],
}

// ***************************************************************************
//                             Static Variables
// ***************************************************************************
// The one copy of the canned poems.  Both the HTTP handler and the local
// session generator read from here.
static HAIKU_TABLE: &[ThemePoems] = &[
    ThemePoems { theme: "春天", poems: &[
        &["樱花飞舞时", "温暖春风轻抚面", "新绿满枝头"],
        &["柳絮随风舞", "桃花笑春风和煦", "万物复苏时"],
        &["春雨润万物", "嫩芽破土见阳光", "生机盎然景"],
    ]},
    ThemePoems { theme: "夏天", poems: &[
        &["蝉鸣声阵阵", "绿荫下乘凉避暑", "清风徐徐来"],
        &["荷花池塘边", "蜻蜓点水起涟漪", "夏日午后闲"],
        &["绿树成荫浓", "知了声声唱夏歌", "暑气渐消散"],
    ]},
    ThemePoems { theme: "秋天", poems: &[
        &["黄叶满地舞", "秋风萧瑟送归雁", "丰收在田间"],
        &["枫叶红如火", "秋高气爽雁南飞", "果实挂满枝"],
        &["金桂飘香时", "秋月如钩挂西楼", "思绪满怀秋"],
    ]},
    ThemePoems { theme: "冬天", poems: &[
        &["雪花纷纷落", "寒风刺骨人归家", "炉火温暖心"],
        &["梅花傲雪开", "寒冬腊月展风采", "坚韧品格高"],
        &["雪覆千山白", "寒梅独自斗严寒", "冬日有暖阳"],
    ]},
    ThemePoems { theme: "月亮", poems: &[&["皎月当空照", "清辉洒向人间路", "思君不见君"]] },
    ThemePoems { theme: "山水", poems: &[&["青山如黛远", "碧水潺潺绕石流", "鸟啼花香浓"]] },
    ThemePoems { theme: "樱花", poems: &[&["粉樱满枝头", "花瓣随风轻飘舞", "春意入心扉"]] },
    ThemePoems { theme: "茶",   poems: &[&["一盏清茶香", "静坐品味人生味", "禅心自然来"]] },
    ThemePoems { theme: "爱情", poems: &[&["相思如潮水", "千里共婵娟月圆", "情深不言语"]] },
    ThemePoems { theme: "友情", poems: &[&["知己难再得", "酒逢知己千杯少", "友谊永如山"]] },
    ThemePoems { theme: "雨",   poems: &[&["细雨润无声", "青石板上起涟漪", "听雨思故人"]] },
    ThemePoems { theme: "雪",   poems: &[&["雪花纷纷落", "银装素裹天地白", "万籁俱寂静"]] },
    ThemePoems { theme: "风",   poems: &[&["轻风过竹林", "叶影摇曳奏天籁", "心境自悠然"]] },
    ThemePoems { theme: "花",   poems: &[&["百花竞芬芳", "蜂蝶共舞醉春光", "岁月静好时"]] },
];

static DEFAULT_HAIKU: Poem = &["静夜思绪飞", "月光洒满窗台上", "诗意自心来"];

// ***************************************************************************
//                              FallbackTable
// ***************************************************************************
/// Read-only view over a theme table and its default poem.
#[derive(Debug, Clone, Copy)]
pub struct FallbackTable {
    entries: &'static [ThemePoems],
    default: Poem,
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::shared()
    }
}

impl FallbackTable {
    /// The built-in table used everywhere in the application.
    pub fn shared() -> Self {
        Self::new(HAIKU_TABLE, DEFAULT_HAIKU)
    }

    pub fn new(entries: &'static [ThemePoems], default: Poem) -> Self {
        Self {entries, default}
    }

    // ---------------------------------------------------------------------------
    // variants:
    // ---------------------------------------------------------------------------
    /** Return the poems registered for the theme, if any.  The theme must match
     * a table key exactly.
     */
    pub fn variants(&self, theme: &str) -> Option<&'static [Poem]> {
        self.entries.iter()
            .find(|e| e.theme == theme)
            .map(|e| e.poems)
    }

    /// Every registered theme in table order.
    pub fn themes(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.theme).collect()
    }

    // ---------------------------------------------------------------------------
    // select:
    // ---------------------------------------------------------------------------
    /** Pick the fallback poem for a theme.  Themes with several variants get one
     * chosen uniformly with the caller's rng, themes with one poem always get
     * that poem and unknown themes get the default poem.  An error is only
     * possible if the table holds a poem that isn't exactly three non-blank
     * lines.
     */
    pub fn select<R: Rng + ?Sized>(&self, theme: &str, rng: &mut R) -> Result<HaikuLines> {
        let poem = match self.variants(theme) {
            Some([single]) => *single,
            Some(poems) => match poems.choose(rng) {
                Some(p) => *p,
                None => self.default,
            },
            None => self.default,
        };
        to_lines(theme, poem)
    }

    /// The poem used for unregistered themes.
    #[cfg(test)]
    pub fn default_lines(&self) -> Result<HaikuLines> {
        to_lines(DEFAULT_THEME, self.default)
    }
}

// ***************************************************************************
//                             Private Functions
// ***************************************************************************
fn to_lines(theme: &str, poem: Poem) -> Result<HaikuLines> {
    if poem.len() != HAIKU_LINES || poem.iter().any(|l| l.trim().is_empty()) {
        return Err(Errors::FallbackTable(
            format!("poem for theme '{}' has {} usable lines, expected {}",
                    theme, poem.iter().filter(|l| !l.trim().is_empty()).count(), HAIKU_LINES)).into());
    }
    Ok([poem[0].to_string(), poem[1].to_string(), poem[2].to_string()])
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn as_lines(poem: Poem) -> HaikuLines {
        [poem[0].to_string(), poem[1].to_string(), poem[2].to_string()]
    }

    #[test]
    fn spring_returns_registered_variant() {
        let table = FallbackTable::shared();
        let registered: Vec<HaikuLines> = table.variants("春天").unwrap()
            .iter().map(|p| as_lines(p)).collect();
        assert_eq!(registered.len(), 3);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let lines = table.select("春天", &mut rng).unwrap();
            assert!(registered.contains(&lines));
        }
    }

    #[test]
    fn spring_variants_all_reachable() {
        let table = FallbackTable::shared();
        let mut rng = StdRng::seed_from_u64(42);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(table.select("春天", &mut rng).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn same_seed_same_choice() {
        let table = FallbackTable::shared();
        let a: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| table.select("秋天", &mut rng).unwrap()).collect()
        };
        let b: Vec<_> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..10).map(|_| table.select("秋天", &mut rng).unwrap()).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn single_poem_theme() {
        let table = FallbackTable::shared();
        let mut rng = StdRng::seed_from_u64(1);
        let lines = table.select("茶", &mut rng).unwrap();
        assert_eq!(lines, ["一盏清茶香", "静坐品味人生味", "禅心自然来"].map(String::from));
    }

    #[test]
    fn unknown_theme_uses_default() {
        let table = FallbackTable::shared();
        let mut rng = StdRng::seed_from_u64(1);
        let lines = table.select("宇宙", &mut rng).unwrap();
        assert_eq!(lines, ["静夜思绪飞", "月光洒满窗台上", "诗意自心来"].map(String::from));
        assert_eq!(table.select(DEFAULT_THEME, &mut rng).unwrap(), lines);
        assert_eq!(table.default_lines().unwrap(), lines);
    }

    #[test]
    fn every_registered_poem_is_three_lines() {
        let table = FallbackTable::shared();
        for theme in table.themes() {
            for poem in table.variants(theme).unwrap() {
                assert!(to_lines(theme, poem).is_ok(), "bad poem for {}", theme);
            }
        }
    }

    #[test]
    fn malformed_table_is_an_error() {
        static SHORT: &[ThemePoems] = &[ThemePoems { theme: "短", poems: &[&["一", "二"]] }];
        let table = FallbackTable::new(SHORT, &["一", ""]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(table.select("短", &mut rng).is_err());
        assert!(table.select("宇宙", &mut rng).is_err());
    }
}
