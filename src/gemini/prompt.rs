/**
 * ============================================================================
 * GEMINI PROMPT MODULE
 * ============================================================================
 *
 * PURPOSE: Build the instruction text sent with each call shape
 *
 * ============================================================================
 */

pub fn build_generate_prompt(prompt: &str) -> String {
    format!("Generate an image based on this prompt: {}", prompt)
}

pub fn build_edit_prompt(instruction: &str) -> String {
    format!("Edit this image based on the following instruction: {}", instruction)
}

pub fn build_fuse_prompt(instruction: &str) -> String {
    format!(
        "Fuse these two images together based on this instruction: {}",
        instruction
    )
}

/**
 * Prompt for turning a short voice clip into a command
 * The model must answer with the spoken words only, or nothing at all
 */
pub fn build_transcription_prompt() -> String {
    "Transcribe the speech in this audio clip. Respond with the spoken words only, \
     without quotes or commentary. If there is no speech, respond with an empty message."
        .to_string()
}

/// First transformation of a live camera frame
pub fn build_live_transform_prompt(command: &str) -> String {
    format!(
        "Transform this camera view: {}. Make it look realistic and maintain the original perspective and lighting.",
        command
    )
}

/// Follow-up transformation applied on top of the previous result
pub fn build_live_refine_prompt(command: &str) -> String {
    format!(
        "Apply this transformation to the camera view: {}. Keep the scene realistic but transform it according to the instruction.",
        command
    )
}
