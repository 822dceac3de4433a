use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Face rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Detection {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Detection {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// Pick the detection with the greatest area. The earliest one wins a tie.
pub fn largest_detection(detections: &[Detection]) -> Option<Detection> {
    let mut best: Option<Detection> = None;
    for det in detections {
        match best {
            Some(b) if det.area() <= b.area() => {}
            _ => best = Some(*det),
        }
    }
    best
}

/// FER+ output classes, in the order of the model's output tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawLabel {
    Neutral,
    Happiness,
    Surprise,
    Sadness,
    Anger,
    Disgust,
    Fear,
    Contempt,
}

impl RawLabel {
    pub const ALL: [RawLabel; 8] = [
        RawLabel::Neutral,
        RawLabel::Happiness,
        RawLabel::Surprise,
        RawLabel::Sadness,
        RawLabel::Anger,
        RawLabel::Disgust,
        RawLabel::Fear,
        RawLabel::Contempt,
    ];

    /// Position of this class in the model output.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RawLabel::Neutral => "neutral",
            RawLabel::Happiness => "happy",
            RawLabel::Surprise => "surprise",
            RawLabel::Sadness => "sad",
            RawLabel::Anger => "angry",
            RawLabel::Disgust => "disgust",
            RawLabel::Fear => "fear",
            RawLabel::Contempt => "contempt",
        }
    }

    /// Canonical slot this class contributes to. Contempt has none of its own.
    pub fn canonical(self) -> Emotion {
        match self {
            RawLabel::Neutral | RawLabel::Contempt => Emotion::Neutral,
            RawLabel::Happiness => Emotion::Happy,
            RawLabel::Surprise => Emotion::Surprise,
            RawLabel::Sadness => Emotion::Sad,
            RawLabel::Anger => Emotion::Angry,
            RawLabel::Disgust => Emotion::Disgust,
            RawLabel::Fear => Emotion::Fear,
        }
    }
}

/// The seven canonical emotions reported in `allEmotions`.
///
/// Declaration order is the iteration order used for serialization and for
/// breaking ties when picking the dominant emotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Emotion {
    Neutral,
    Happy,
    Surprise,
    Sad,
    Angry,
    Disgust,
    Fear,
}

impl Emotion {
    pub const ALL: [Emotion; 7] = [
        Emotion::Neutral,
        Emotion::Happy,
        Emotion::Surprise,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Disgust,
        Emotion::Fear,
    ];

    pub fn as_str(self) -> &'static str {
        self.raw_label().as_str()
    }

    /// The model class carrying the same name.
    pub fn raw_label(self) -> RawLabel {
        match self {
            Emotion::Neutral => RawLabel::Neutral,
            Emotion::Happy => RawLabel::Happiness,
            Emotion::Surprise => RawLabel::Surprise,
            Emotion::Sad => RawLabel::Sadness,
            Emotion::Angry => RawLabel::Anger,
            Emotion::Disgust => RawLabel::Disgust,
            Emotion::Fear => RawLabel::Fear,
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level mood shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Mood {
    Angry,
    Stressed,
    Anxious,
    Happy,
    Sad,
    Excited,
    Neutral,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Angry,
        Mood::Stressed,
        Mood::Anxious,
        Mood::Happy,
        Mood::Sad,
        Mood::Excited,
        Mood::Neutral,
    ];

    /// Mood for a model class. Contempt is listed even though its mass is
    /// merged into neutral before a dominant class is chosen.
    pub fn from_raw(label: RawLabel) -> Mood {
        match label {
            RawLabel::Anger => Mood::Angry,
            RawLabel::Disgust => Mood::Stressed,
            RawLabel::Fear => Mood::Anxious,
            RawLabel::Happiness => Mood::Happy,
            RawLabel::Sadness => Mood::Sad,
            RawLabel::Surprise => Mood::Excited,
            RawLabel::Neutral => Mood::Neutral,
            RawLabel::Contempt => Mood::Stressed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Angry => "Angry",
            Mood::Stressed => "Stressed",
            Mood::Anxious => "Anxious",
            Mood::Happy => "Happy",
            Mood::Sad => "Sad",
            Mood::Excited => "Excited",
            Mood::Neutral => "Neutral",
        }
    }

    pub fn empathetic_message(self) -> &'static str {
        match self {
            Mood::Angry => "I notice you might be feeling frustrated or upset right now. It's completely okay to feel this way. Would you like to talk about what's bothering you? I'm here to listen without judgment.",
            Mood::Stressed => "It seems like you might be under some pressure. Remember, it's important to take things one step at a time. Would you like to try a breathing exercise or talk about what's on your mind?",
            Mood::Anxious => "I can sense you might be feeling a bit anxious. You're not alone in this. Let's take a moment together \u{2013} perhaps a calming exercise would help? Or we could talk through what's making you feel this way.",
            Mood::Happy => "It's wonderful to see you're in good spirits! \u{1F60A} Would you like to share what's making you feel so positive today? Or perhaps continue this good energy with some mindfulness?",
            Mood::Sad => "I notice you might be feeling a bit down. It's okay to have these feelings \u{2013} they're a natural part of being human. I'm here for you. Would you like to talk about it, or shall I suggest something that might help lift your spirits?",
            Mood::Excited => "You seem energized! That's great energy to have. Would you like to channel this into something productive, or perhaps share what's got you feeling this way?",
            Mood::Neutral => "Hello! I'm here whenever you need to talk. How has your day been so far? Is there anything specific on your mind that you'd like to discuss?",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw FER+ logits, indexed by [`RawLabel::index`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawScores(pub [f32; 8]);

impl RawScores {
    pub fn get(&self, label: RawLabel) -> f32 {
        self.0[label.index()]
    }
}

/// Percentages (0–100) over the canonical emotions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EmotionDistribution([f64; 7]);

impl EmotionDistribution {
    pub fn zeroed() -> Self {
        Self([0.0; 7])
    }

    /// Every emotion set to `value`.
    pub fn uniform(value: f64) -> Self {
        Self([value; 7])
    }

    pub fn get(&self, emotion: Emotion) -> f64 {
        self.0[emotion as usize]
    }

    pub fn add(&mut self, emotion: Emotion, value: f64) {
        self.0[emotion as usize] += value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Emotion, f64)> + '_ {
        Emotion::ALL.iter().map(move |&e| (e, self.get(e)))
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }

    /// Highest-valued emotion; on a tie the one earlier in [`Emotion::ALL`] wins.
    pub fn dominant(&self) -> Emotion {
        let mut best = Emotion::ALL[0];
        for (emotion, value) in self.iter() {
            if value > self.get(best) {
                best = emotion;
            }
        }
        best
    }

    /// Copy with every value rounded to two decimals.
    pub fn rounded(&self) -> Self {
        Self(self.0.map(round2))
    }
}

impl Serialize for EmotionDistribution {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Emotion::ALL.len()))?;
        for (emotion, value) in self.iter() {
            map.serialize_entry(emotion.as_str(), &value)?;
        }
        map.end()
    }
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
