//! Canonical paths for redirects and template links.

pub fn post_url(post_id: i32) -> String {
    format!("/posts/{}/", post_id)
}

pub fn profile_url(username: &str) -> String {
    format!("/profile/{}/", username)
}

pub fn category_url(slug: &str) -> String {
    format!("/{}/", slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_carry_trailing_slashes() {
        assert_eq!(post_url(5), "/posts/5/");
        assert_eq!(profile_url("alice"), "/profile/alice/");
        assert_eq!(category_url("travel"), "/travel/");
    }
}
