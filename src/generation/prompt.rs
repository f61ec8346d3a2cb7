// src/generation/prompt.rs
// Pure prompt construction. No I/O, no failure modes.

use crate::catalog::ArtStyle;

/// Build the generation prompt for a studio product photograph of
/// `product_type` decorated with the given style.
pub fn build_generation_prompt(
    style: &ArtStyle,
    product_type: &str,
    instructions: Option<&str>,
) -> String {
    let name = style.name;
    let mut prompt = format!(
        "Create a professional e-commerce product photograph of a {product_type} featuring authentic {name} artwork.\n\
         \n\
         The {product_type} should be decorated with {name} art, which is characterized by: {style_prompt}\n\
         \n\
         The scene is a clean, studio-lit product shot against a simple background. The {product_type} is positioned at a slight angle to show the artwork clearly. The lighting is soft and even, creating subtle shadows that give the product dimension. The {name} design is the focal point, with traditional motifs and colors applied authentically to the {product_type} surface.\n\
         \n\
         The final image should look like a high-end product catalog photo, suitable for an artisan marketplace.",
        style_prompt = style.style_prompt,
    );

    if let Some(instructions) = instructions {
        if !instructions.trim().is_empty() {
            prompt.push_str(&format!("\n\nSpecific requirements: {}", instructions.trim()));
        }
    }

    prompt
}

/// Label sentence preceding the style's reference images.
pub fn style_reference_label(style_name: &str) -> String {
    format!("Here are reference images showing the {style_name} art style:")
}

/// Label sentence preceding the user-supplied product reference image.
pub fn product_reference_label(product_type: &str) -> String {
    format!("Here is a reference image of the {product_type} to use as the base:")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ArtStyleCatalog;
    use std::path::Path;

    #[test]
    fn prompt_cites_style_fragment_verbatim() {
        let catalog = ArtStyleCatalog::load(Path::new("/nonexistent"));
        let warli = catalog.get("warli").unwrap();

        let prompt = build_generation_prompt(warli, "Coffee Mug", None);
        assert!(prompt.contains("Coffee Mug"));
        assert!(prompt.contains("Warli Painting"));
        assert!(prompt.contains(warli.style_prompt));
        assert!(!prompt.contains("Specific requirements"));
    }

    #[test]
    fn instructions_append_a_requirements_clause() {
        let catalog = ArtStyleCatalog::load(Path::new("/nonexistent"));
        let gond = catalog.get("gond").unwrap();

        let prompt = build_generation_prompt(gond, "Tote Bag", Some("  use a navy background "));
        assert!(prompt.ends_with("Specific requirements: use a navy background"));

        let blank = build_generation_prompt(gond, "Tote Bag", Some("   "));
        assert!(!blank.contains("Specific requirements"));
    }

    #[test]
    fn labels_name_their_subject() {
        assert_eq!(
            style_reference_label("Gond Painting"),
            "Here are reference images showing the Gond Painting art style:"
        );
        assert_eq!(
            product_reference_label("Ceramic Vase"),
            "Here is a reference image of the Ceramic Vase to use as the base:"
        );
    }
}
