use std::collections::BTreeMap;

use rand::distr::Alphanumeric;
use rand::Rng;

use super::{Derivative, StreamPhoto};
use travelog_api_structs::AlbumPhoto;

const GENERATED_ID_LEN: usize = 11;

/// Picks the derivative with the numerically largest height key.
///
/// Keys that are not integers (poster frames and the like) are never picked.
pub fn select_derivative(derivatives: &BTreeMap<String, Derivative>) -> Option<&Derivative> {
    derivatives
        .iter()
        .filter_map(|(key, derivative)| key.parse::<u32>().ok().map(|height| (height, derivative)))
        .max_by_key(|(height, _)| *height)
        .map(|(_, derivative)| derivative)
}

/// Projects a provider record onto an [`AlbumPhoto`], or `None` if no URL could be resolved.
pub fn project_photo(photo: &StreamPhoto) -> Option<AlbumPhoto> {
    let derivative = select_derivative(&photo.derivatives)?;
    let url = derivative.url.clone().filter(|url| !url.is_empty())?;

    let id = match photo.guid.as_deref() {
        Some(guid) if !guid.is_empty() => guid.to_string(),
        _ => generated_id(),
    };

    Some(AlbumPhoto {
        url,
        width: derivative.width,
        height: derivative.height,
        caption: photo.caption.clone().unwrap_or_default(),
        id,
        timestamp: photo.created.clone(),
    })
}

fn generated_id() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(|c| char::from(c).to_ascii_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn derivative(height: u32) -> Derivative {
        Derivative {
            url: Some(format!("https://cdn.example/{height}.jpg")),
            width: Some(height * 3 / 4),
            height: Some(height),
        }
    }

    fn derivatives(heights: &[&str]) -> BTreeMap<String, Derivative> {
        heights
            .iter()
            .map(|key| (key.to_string(), derivative(key.parse().unwrap_or(0))))
            .collect()
    }

    #[test]
    fn test_selects_largest_height_key() {
        let derivatives = derivatives(&["100", "200", "400"]);
        let selected = select_derivative(&derivatives).unwrap();
        assert_eq!(selected.height, Some(400));
    }

    #[test]
    fn test_compares_keys_numerically() {
        // "1000" sorts before "342" as a string.
        let derivatives = derivatives(&["342", "1000", "2049"]);
        assert_eq!(select_derivative(&derivatives).unwrap().height, Some(2049));
    }

    #[test]
    fn test_ignores_non_numeric_keys() {
        let mut derivatives = derivatives(&["342"]);
        derivatives.insert("PosterFrame".to_string(), derivative(9999));
        assert_eq!(select_derivative(&derivatives).unwrap().height, Some(342));
    }

    #[test]
    fn test_photo_without_derivatives_is_dropped() {
        assert_eq!(project_photo(&StreamPhoto::default()), None);
    }

    #[test]
    fn test_photo_without_url_is_dropped() {
        let photo = StreamPhoto {
            derivatives: [(
                "400".to_string(),
                Derivative {
                    url: None,
                    ..derivative(400)
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        };
        assert_eq!(project_photo(&photo), None);
    }

    #[test]
    fn test_projection_keeps_source_fields() {
        let photo = StreamPhoto {
            guid: Some("ABC-123".to_string()),
            caption: Some("Colosseum at night".to_string()),
            created: Some("2025-09-10T21:04:00Z".to_string()),
            derivatives: derivatives(&["100", "200", "400"]),
        };

        assert_eq!(
            project_photo(&photo),
            Some(AlbumPhoto {
                url: "https://cdn.example/400.jpg".to_string(),
                width: Some(300),
                height: Some(400),
                caption: "Colosseum at night".to_string(),
                id: "ABC-123".to_string(),
                timestamp: Some("2025-09-10T21:04:00Z".to_string()),
            })
        );
    }

    #[test]
    fn test_projection_fills_missing_caption_and_id() {
        let photo = StreamPhoto {
            derivatives: derivatives(&["200"]),
            ..Default::default()
        };
        let projected = project_photo(&photo).unwrap();

        assert_eq!(projected.caption, "");
        assert_eq!(projected.id.len(), GENERATED_ID_LEN);
        assert!(projected
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_eq!(projected.timestamp, None);
    }
}
