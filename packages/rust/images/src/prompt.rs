//! Prompt text for generative cover images.

use autopress_shared::ImageSettings;

fn template(genre: &str) -> &'static str {
    let genre = genre.to_lowercase();
    if genre.contains("business") || genre.contains("ビジネス") {
        "Business concept image for {topic}, corporate style, professional atmosphere, no text"
    } else if genre.contains("tech") || genre.contains("テクノロジー") {
        "Technology themed image about {topic}, futuristic design, digital art style, no text"
    } else if genre.contains("lifestyle") || genre.contains("ライフ") {
        "Lifestyle photography for {topic}, warm colors, natural lighting, no text"
    } else {
        "Professional blog header image about {topic}, clean modern design, no text, high quality photography"
    }
}

/// Build an image prompt from the article and the site's image settings.
///
/// The topic is the first keyword, or the first three whitespace tokens of
/// the title when there are no keywords.
pub fn image_prompt(title: &str, keywords: &[String], genre: &str, settings: &ImageSettings) -> String {
    let topic = match keywords.first() {
        Some(k) => k.clone(),
        None => title.split_whitespace().take(3).collect::<Vec<_>>().join(" "),
    };

    let mut prompt = template(genre).replace("{topic}", &topic);

    if !keywords.is_empty() {
        let featured: Vec<&str> = keywords.iter().take(3).map(String::as_str).collect();
        prompt.push_str(&format!(", featuring {}", featured.join(", ")));
    }
    for extra in [&settings.style, &settings.tone, &settings.quality, &settings.instructions] {
        if !extra.is_empty() {
            prompt.push_str(", ");
            prompt.push_str(extra);
        }
    }
    if !settings.avoid_terms.is_empty() {
        prompt.push_str(&format!(", avoid: {}", settings.avoid_terms.join(", ")));
    }
    prompt
}
