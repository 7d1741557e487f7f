//! Built-in transformation presets, in display order.

use serde::{Deserialize, Serialize};

/// Preset grouping shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetCategory {
    /// Artistic restyling.
    Style,
    /// Profile and headshot looks.
    Professional,
    /// Playful costume changes.
    Fun,
    /// Age progression.
    Age,
}

impl std::fmt::Display for PresetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Style => write!(f, "style"),
            Self::Professional => write!(f, "professional"),
            Self::Fun => write!(f, "fun"),
            Self::Age => write!(f, "age"),
        }
    }
}

/// Icon handle; front ends map these to their own glyphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresetIcon {
    /// Grid of tiles.
    Grid,
    /// Clock face.
    Clock,
    /// Crown.
    Crown,
    /// Sparkles.
    Sparkles,
    /// Pencil.
    Pencil,
    /// User silhouette.
    UserCircle,
}

/// A predefined transformation instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Preset {
    /// Stable identifier.
    pub id: u32,
    /// Display label.
    pub label: &'static str,
    /// Instruction sent verbatim to the image service.
    pub prompt: &'static str,
    /// Grouping.
    pub category: PresetCategory,
    /// Presentational icon.
    pub icon: PresetIcon,
}

static PRESETS: [Preset; 9] = [
    Preset {
        id: 1,
        label: "9 farklı saç sitili uygula",
        prompt: "Make a 3x3 grid of different hairstyles",
        category: PresetCategory::Style,
        icon: PresetIcon::Grid,
    },
    Preset {
        id: 2,
        label: "20-80 yaş aralığı",
        prompt: "Generate the realistic photo of this person through the ages from 20 up to 80 years old for each 10 years with a different pose.",
        category: PresetCategory::Age,
        icon: PresetIcon::Clock,
    },
    Preset {
        id: 3,
        label: "Prens",
        prompt: "Prens yap.",
        category: PresetCategory::Fun,
        icon: PresetIcon::Crown,
    },
    Preset {
        id: 4,
        label: "Prenses",
        prompt: "Prenses yap.",
        category: PresetCategory::Fun,
        icon: PresetIcon::Crown,
    },
    Preset {
        id: 5,
        label: "Ghibli",
        prompt: "Fotoğrafı ghibli yap.",
        category: PresetCategory::Style,
        icon: PresetIcon::Sparkles,
    },
    Preset {
        id: 6,
        label: "Pixar",
        prompt: "Fotoğrafı pixar yap.",
        category: PresetCategory::Style,
        icon: PresetIcon::Sparkles,
    },
    Preset {
        id: 7,
        label: "Karakalem",
        prompt: "Create a photo-style line drawing / ink sketch of the faces identical to the uploaded reference image — keep every facial feature, proportion, and expression exactly the same. Use black and white ink tones with intricate, fine line detailing, drawn on a notebook-page style background. Show a right hand holding a pen and an eraser near the sketch, as if the artist is still working.",
        category: PresetCategory::Style,
        icon: PresetIcon::Pencil,
    },
    Preset {
        id: 8,
        label: "LinkedIn profil fotoğrafı (Siyah Beyaz)",
        prompt: "Create a professional monochrome (black and white) portrait based on my uploaded selfie. The photo should have a clean, neutral background with soft studio lighting that enhances natural skin texture and facial symmetry. The subject (me) is facing the camera directly, smiling naturally, and framed from the shoulders up in a circular crop. Outfit should be a light-colored blazer or suit jacket over a simple top, with hair styled naturally down. The overall look should feel modern, polished, and LinkedIn-profile ready, similar to a corporate studio headshot. Keep the expression warm and approachable, lighting balanced, and image sharp. Composition: portrait orientation, centered, evenly lit, minimal contrast shadows.",
        category: PresetCategory::Professional,
        icon: PresetIcon::UserCircle,
    },
    Preset {
        id: 9,
        label: "LinkedIn profil fotoğrafı (Renkli)",
        prompt: "Create a hyperrealistic professional color portrait of the same person as in the uploaded reference photo, maintaining exact facial proportions, eye spacing, nose width, lip thickness, and natural hairline. The face must look authentic, unretouched, and 95%+ identical to the reference photo — no idealization or reshaping. Use soft, diffused studio lighting from a 45-degree angle to highlight natural skin texture and facial depth. Background: neutral mid-gray, gradient tone, no patterns or props. Expression: gentle, natural smile, eyes open and focused directly on the lens. Composition: shoulders up, circular crop, centered, portrait orientation. Outfit: light-colored blazer or suit jacket over a simple white shirt, collar slightly open. Hair: styled naturally, matching the reference’s hairline and direction. Style reference: LinkedIn corporate photography, Leica Summicron sharpness, Kodak color tonality. Maintain fine skin details (pores, lines, texture), subtle contrast, and evenly balanced shadows. Do not apply beautification filters or symmetry corrections. Ensure realism, authenticity, and professional polish.",
        category: PresetCategory::Professional,
        icon: PresetIcon::UserCircle,
    },
];

/// Returns every preset in display order.
pub fn list() -> &'static [Preset] {
    &PRESETS
}

/// Looks up a preset by id.
pub fn find(id: u32) -> Option<&'static Preset> {
    PRESETS.iter().find(|p| p.id == id)
}

/// Returns the presets in one category, keeping display order.
pub fn by_category(category: PresetCategory) -> impl Iterator<Item = &'static Preset> {
    PRESETS.iter().filter(move |p| p.category == category)
}
