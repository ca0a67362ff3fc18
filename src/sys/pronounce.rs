use std::fmt::Display;

/// Mouth shape shown while a vowel sound is pronounced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Viseme {
    A,
    I,
    U,
    E,
    O,
    Idle,
}

impl Display for Viseme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = self.as_ref();
        write!(f, "{s}")
    }
}

impl AsRef<str> for Viseme {
    fn as_ref(&self) -> &str {
        match self {
            Viseme::A => "a",
            Viseme::I => "i",
            Viseme::U => "u",
            Viseme::E => "e",
            Viseme::O => "o",
            Viseme::Idle => "-",
        }
    }
}

pub const PRONOUNCE_A: &str = "あかさたなはまやらわがざだばぱぁゃゎアカサタナハマヤラワガザダバパァャヮaA";
pub const PRONOUNCE_I: &str = "いきしちにひみりぎじぢびぴぃゐイキシチニヒミリギジヂビピィヰiI";
pub const PRONOUNCE_U: &str = "うくすつぬふむゆるぐずづぶぷぅゅゔウクスツヌフムユルグズヅブプゥュヴuU";
pub const PRONOUNCE_E: &str = "えけせてねへめれげぜでべぺぇゑエケセテネヘメレゲゼデベペェヱeE";
pub const PRONOUNCE_O: &str = "おこそとのほもよろをごぞどぼぽぉょオコソトノホモヨロヲゴゾドボポォョoO";

/// Checked in order, first match wins.
pub const PRONOUNCE_TABLE: [(Viseme, &str); 5] = [
    (Viseme::A, PRONOUNCE_A),
    (Viseme::I, PRONOUNCE_I),
    (Viseme::U, PRONOUNCE_U),
    (Viseme::E, PRONOUNCE_E),
    (Viseme::O, PRONOUNCE_O),
];

/// Returns the viseme for a displayed character, `None` for whitespace,
/// punctuation and anything outside the tables.
pub fn classify(c: char) -> Option<Viseme> {
    PRONOUNCE_TABLE
        .iter()
        .find(|(_, class)| class.contains(c))
        .map(|(viseme, _)| *viseme)
}

/// Classifies the `index`-th character of `message`, counted in chars.
pub fn classify_at(message: &str, index: usize) -> Option<Viseme> {
    message.chars().nth(index).and_then(classify)
}
