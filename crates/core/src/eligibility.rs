use crate::settings::AutoPublishSettings;
use crate::types::ContentItem;

/// Why a content item was not eligible for auto-publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Disabled,
    PostType,
    Category,
    MissingFeaturedImage,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Disabled => "auto-publish disabled",
            Rejection::PostType => "post type not allowed",
            Rejection::Category => "no matching category",
            Rejection::MissingFeaturedImage => "featured image required",
        }
    }
}

/// Evaluate the policy in order, stopping at the first failing rule.
pub fn check(settings: &AutoPublishSettings, content: &ContentItem) -> Result<(), Rejection> {
    if !settings.enabled {
        return Err(Rejection::Disabled);
    }

    if !settings.post_types.is_empty()
        && !settings
            .post_types
            .iter()
            .any(|allowed| allowed == &content.post_type)
    {
        return Err(Rejection::PostType);
    }

    if !settings.categories.is_empty()
        && !content
            .category_ids
            .iter()
            .any(|id| settings.categories.contains(id))
    {
        return Err(Rejection::Category);
    }

    if settings.require_featured_image && content.featured_media_id.is_none() {
        return Err(Rejection::MissingFeaturedImage);
    }

    Ok(())
}

pub fn is_eligible(settings: &AutoPublishSettings, content: &ContentItem) -> bool {
    check(settings, content).is_ok()
}
