use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Kind of content stored under a [`crate::BlobId`].
///
/// Codes are fixed by the wire format. Codes outside the catalogue are kept
/// as [`BlobType::Unknown`] so that a parameter block always decodes; whether
/// a type may be served is decided by [`BlobType::is_directly_streamable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlobType {
    None,
    Texture,
    Sound,
    CallingCard,
    Landmark,
    Script,
    Clothing,
    Object,
    Notecard,
    Category,
    RootCategory,
    LslText,
    LslBytecode,
    TextureTga,
    BodyPart,
    Trash,
    SnapshotCategory,
    LostAndFound,
    SoundWav,
    ImageTga,
    ImageJpeg,
    Animation,
    Gesture,
    SimState,
    Unknown(i32),
}

impl BlobType {
    /// Every catalogued type, in code order.
    pub const ALL: [BlobType; 24] = [
        BlobType::None,
        BlobType::Texture,
        BlobType::Sound,
        BlobType::CallingCard,
        BlobType::Landmark,
        BlobType::Script,
        BlobType::Clothing,
        BlobType::Object,
        BlobType::Notecard,
        BlobType::Category,
        BlobType::RootCategory,
        BlobType::LslText,
        BlobType::LslBytecode,
        BlobType::TextureTga,
        BlobType::BodyPart,
        BlobType::Trash,
        BlobType::SnapshotCategory,
        BlobType::LostAndFound,
        BlobType::SoundWav,
        BlobType::ImageTga,
        BlobType::ImageJpeg,
        BlobType::Animation,
        BlobType::Gesture,
        BlobType::SimState,
    ];

    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => BlobType::None,
            0 => BlobType::Texture,
            1 => BlobType::Sound,
            2 => BlobType::CallingCard,
            3 => BlobType::Landmark,
            4 => BlobType::Script,
            5 => BlobType::Clothing,
            6 => BlobType::Object,
            7 => BlobType::Notecard,
            8 => BlobType::Category,
            9 => BlobType::RootCategory,
            10 => BlobType::LslText,
            11 => BlobType::LslBytecode,
            12 => BlobType::TextureTga,
            13 => BlobType::BodyPart,
            14 => BlobType::Trash,
            15 => BlobType::SnapshotCategory,
            16 => BlobType::LostAndFound,
            17 => BlobType::SoundWav,
            18 => BlobType::ImageTga,
            19 => BlobType::ImageJpeg,
            20 => BlobType::Animation,
            21 => BlobType::Gesture,
            22 => BlobType::SimState,
            other => BlobType::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            BlobType::None => -1,
            BlobType::Texture => 0,
            BlobType::Sound => 1,
            BlobType::CallingCard => 2,
            BlobType::Landmark => 3,
            BlobType::Script => 4,
            BlobType::Clothing => 5,
            BlobType::Object => 6,
            BlobType::Notecard => 7,
            BlobType::Category => 8,
            BlobType::RootCategory => 9,
            BlobType::LslText => 10,
            BlobType::LslBytecode => 11,
            BlobType::TextureTga => 12,
            BlobType::BodyPart => 13,
            BlobType::Trash => 14,
            BlobType::SnapshotCategory => 15,
            BlobType::LostAndFound => 16,
            BlobType::SoundWav => 17,
            BlobType::ImageTga => 18,
            BlobType::ImageJpeg => 19,
            BlobType::Animation => 20,
            BlobType::Gesture => 21,
            BlobType::SimState => 22,
            BlobType::Unknown(code) => *code,
        }
    }

    /// Short machine name, used in CLI arguments and store paths.
    pub fn short_name(&self) -> &'static str {
        match self {
            BlobType::None => "none",
            BlobType::Texture => "texture",
            BlobType::Sound => "sound",
            BlobType::CallingCard => "callcard",
            BlobType::Landmark => "landmark",
            BlobType::Script => "script",
            BlobType::Clothing => "clothing",
            BlobType::Object => "object",
            BlobType::Notecard => "notecard",
            BlobType::Category => "category",
            BlobType::RootCategory => "root",
            BlobType::LslText => "lsltext",
            BlobType::LslBytecode => "lslbyte",
            BlobType::TextureTga => "txtr_tga",
            BlobType::BodyPart => "bodypart",
            BlobType::Trash => "trash",
            BlobType::SnapshotCategory => "snapshot",
            BlobType::LostAndFound => "lstndfnd",
            BlobType::SoundWav => "snd_wav",
            BlobType::ImageTga => "img_tga",
            BlobType::ImageJpeg => "jpeg",
            BlobType::Animation => "animatn",
            BlobType::Gesture => "gesture",
            BlobType::SimState => "simstate",
            BlobType::Unknown(_) => "unknown",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.short_name().eq_ignore_ascii_case(name))
    }

    /// Name suitable for log lines and user-facing messages.
    pub fn human_readable(&self) -> &'static str {
        match self {
            BlobType::None => "none",
            BlobType::Texture => "texture",
            BlobType::Sound => "sound",
            BlobType::CallingCard => "calling card",
            BlobType::Landmark => "landmark",
            BlobType::Script => "legacy script",
            BlobType::Clothing => "clothing",
            BlobType::Object => "object",
            BlobType::Notecard => "note card",
            BlobType::Category => "folder",
            BlobType::RootCategory => "root",
            BlobType::LslText => "lsl2 script",
            BlobType::LslBytecode => "lsl bytecode",
            BlobType::TextureTga => "tga texture",
            BlobType::BodyPart => "body part",
            BlobType::Trash => "trash",
            BlobType::SnapshotCategory => "snapshot",
            BlobType::LostAndFound => "lost and found",
            BlobType::SoundWav => "sound",
            BlobType::ImageTga => "targa image",
            BlobType::ImageJpeg => "jpeg image",
            BlobType::Animation => "animation",
            BlobType::Gesture => "gesture",
            BlobType::SimState => "simstate",
            BlobType::Unknown(_) => "unknown",
        }
    }

    /// Allow-list of types that may be pulled straight out of the store by an
    /// asset transfer. Anything else is refused before a fetch is issued.
    pub fn is_directly_streamable(&self) -> bool {
        matches!(
            self,
            BlobType::Sound
                | BlobType::Landmark
                | BlobType::Clothing
                | BlobType::BodyPart
                | BlobType::Gesture
                | BlobType::Animation
        )
    }
}

impl Display for BlobType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            BlobType::Unknown(code) => write!(f, "unknown({code})"),
            other => f.write_str(other.human_readable()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable_across_the_catalogue() {
        for t in BlobType::ALL {
            assert_eq!(BlobType::from_code(t.code()), t);
        }
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let t = BlobType::from_code(4242);
        assert_eq!(t, BlobType::Unknown(4242));
        assert_eq!(t.code(), 4242);
        assert!(!t.is_directly_streamable());
    }

    #[test]
    fn allow_list_is_exactly_six_types() {
        let allowed: Vec<_> = BlobType::ALL
            .iter()
            .filter(|t| t.is_directly_streamable())
            .collect();
        assert_eq!(
            allowed,
            vec![
                &BlobType::Sound,
                &BlobType::Landmark,
                &BlobType::Clothing,
                &BlobType::BodyPart,
                &BlobType::Animation,
                &BlobType::Gesture,
            ]
        );
    }

    #[test]
    fn short_names_round_trip() {
        assert_eq!(BlobType::from_short_name("bodypart"), Some(BlobType::BodyPart));
        assert_eq!(BlobType::from_short_name("ANIMATN"), Some(BlobType::Animation));
        assert_eq!(BlobType::from_short_name("nope"), None);
    }
}
