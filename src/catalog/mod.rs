// src/catalog/mod.rs
// Static registry of traditional art styles. Loaded once at boot, read-only after.

use std::path::Path;

use tracing::warn;

const ART_FORMS_SUBDIR: &str = "assets/art_forms";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// One traditional art style the generator can apply to a product.
#[derive(Debug, Clone)]
pub struct ArtStyle {
    pub key: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub style_prompt: &'static str,
    /// Relative paths under the storage root, e.g. `assets/art_forms/warli/01.jpg`.
    pub reference_images: Vec<String>,
}

pub struct ArtStyleCatalog {
    styles: Vec<ArtStyle>,
}

impl ArtStyleCatalog {
    /// Build the catalog, discovering reference images under
    /// `<storage_root>/assets/art_forms/<key>/`.
    pub fn load(storage_root: &Path) -> Self {
        let styles = style_definitions()
            .into_iter()
            .map(|(key, name, description, style_prompt)| ArtStyle {
                key,
                name,
                description,
                style_prompt,
                reference_images: scan_reference_images(storage_root, key),
            })
            .collect();

        Self { styles }
    }

    pub fn all(&self) -> &[ArtStyle] {
        &self.styles
    }

    pub fn get(&self, key: &str) -> Option<&ArtStyle> {
        self.styles.iter().find(|s| s.key == key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.key.to_string()).collect()
    }
}

fn scan_reference_images(storage_root: &Path, key: &str) -> Vec<String> {
    let dir = storage_root.join(ART_FORMS_SUBDIR).join(key);
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Vec::new(),
    };

    let mut images: Vec<String> = entries
        .filter_map(|entry| {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!("Error reading {}: {err}", dir.display());
                    return None;
                }
            };
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let ext = Path::new(&file_name)
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())?;
            IMAGE_EXTENSIONS
                .contains(&ext.as_str())
                .then(|| format!("{ART_FORMS_SUBDIR}/{key}/{file_name}"))
        })
        .collect();

    // Directory order is platform-dependent; keep the list stable.
    images.sort();
    images
}

#[rustfmt::skip]
fn style_definitions() -> Vec<(&'static str, &'static str, &'static str, &'static str)> {
    vec![
        (
            "bluepottery",
            "Blue Pottery",
            "Traditional Jaipur craft featuring cobalt blue designs on white ceramic, with Persian-influenced floral and geometric patterns.",
            "Blue Pottery style with distinctive cobalt blue, turquoise and white color palette, Persian-inspired floral motifs, geometric patterns on ceramic surface, handcrafted glazed finish",
        ),
        (
            "cheriyal",
            "Cheriyal Painting",
            "Scroll painting tradition from Telangana with bold colors and mythological narratives in a distinctive folk style.",
            "Cheriyal painting style with vibrant red backgrounds, bold primary colors, stylized human figures, narrative mythological scenes, folk art aesthetic with strong black outlines",
        ),
        (
            "gond",
            "Gond Painting",
            "Tribal art from Madhya Pradesh featuring dots and dashes creating intricate patterns of flora and fauna.",
            "Gond tribal art style with intricate dot and dash patterns filling animal and nature forms, vibrant contrasting colors, stylized depictions of tigers, birds, trees with detailed internal patterns",
        ),
        (
            "handsculpting",
            "Hand Sculpting",
            "Traditional hand-carved wooden craft with organic shapes and natural wood grain textures.",
            "Hand sculpted style with organic carved forms, natural wood grain textures, smooth polished surfaces, artisanal handcrafted aesthetic with visible craftsmanship details",
        ),
        (
            "kalamkari",
            "Kalamkari",
            "Pen-drawn textile art from Andhra Pradesh with mythological narratives and natural dyes.",
            "Kalamkari textile art style with fine pen-drawn details, earth-tone natural dyes (red, brown, black, yellow), mythological scenes with intricate borders and paisley motifs",
        ),
        (
            "kavad",
            "Kavad Storytelling",
            "Portable wooden shrine from Rajasthan with painted panels depicting mythological stories.",
            "Kavad storytelling style with bright primary colors, wooden panel paintings, mythological narrative scenes, red and yellow dominant palette, folk art figures with ornate borders",
        ),
        (
            "madurkathi",
            "Madurkathi Weaving",
            "Traditional mat weaving from West Bengal using natural reed with geometric patterns.",
            "Madurkathi woven style with natural reed textures, geometric woven patterns, earthy beige and brown tones, traditional Bengali craft aesthetic with intricate interlacing",
        ),
        (
            "miniature",
            "Miniature Painting",
            "Detailed small-scale paintings with intricate brushwork, rich colors, and royal court themes.",
            "Miniature painting style with extremely fine detailed brushwork, rich jewel-tone colors, gold and silver accents, royal court scenes, ornate borders, Persian and Mughal influences",
        ),
        (
            "nirmal",
            "Nirmal Painting",
            "Paintings from Telangana featuring vibrant colors, gold leaf work, and mythological themes on wood.",
            "Nirmal painting style with rich vibrant colors, gold leaf accents, mythological and nature themes, smooth lacquered finish typical of Telangana wood paintings",
        ),
        (
            "pattachitra",
            "Pattachitra Painting",
            "Cloth-based scroll painting from Odisha with mythological themes and intricate borders.",
            "Pattachitra style with rich jewel-tone colors, intricate floral borders, mythological scenes especially Lord Jagannath, fine detailed brushwork on cloth-like texture",
        ),
        (
            "tholubommalata",
            "Tholu Bommalata",
            "Traditional leather shadow puppet art from Andhra Pradesh with intricate cut-out designs.",
            "Tholu Bommalata shadow puppet style with intricate leather cutwork, translucent colored sections, mythological characters, detailed perforated patterns creating light and shadow effects",
        ),
        (
            "warli",
            "Warli Painting",
            "Traditional tribal art from Maharashtra featuring white geometric patterns on terracotta backgrounds.",
            "Warli tribal art style with white geometric stick figures on terracotta/red-brown background, minimalist triangular human figures, circular sun and moon motifs, depicting rural life scenes",
        ),
    ]
}
