//! Prompt text sent to the image service.

use crate::OutfitStyle;

/// Builds the instruction for rendering a model wearing the uploaded item.
#[must_use]
pub fn generation_prompt(style: OutfitStyle) -> String {
    format!(
        "You are a digital fashion stylist.\n\
         Generate a high-quality image of a realistic 3D human model wearing the clothing item shown in the input image.\n\
         \n\
         Requirements:\n\
         1. The input clothing item MUST be worn by the model.\n\
         2. The model should be styled in a complete {label} outfit (including matching shoes, accessories, and bottoms/tops as needed).\n\
         3. The aesthetic should be that of a high-end digital fashion editorial or realistic 3D character render.\n\
         4. Ensure the model is posing naturally to showcase the outfit.",
        label = style.label()
    )
}

/// Builds the instruction for editing an already generated image.
#[must_use]
pub fn edit_prompt(instruction: &str) -> String {
    format!(
        "Edit this image of the fashion model: {}. Maintain the photorealistic 3D model style.",
        instruction.trim()
    )
}
