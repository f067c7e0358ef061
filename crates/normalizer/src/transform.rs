use crate::models::{
    NormalizedPullRequest, NormalizedRepository, NormalizedReview, NormalizedUser, ReviewState,
};
use crate::payloads::{PullRequestPayload, RepoPayload, ReviewPayload, UserPayload};

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),
}

pub fn normalize_repo(payload: &RepoPayload) -> Result<NormalizedRepository, NormalizeError> {
    let url = payload
        .html_url
        .clone()
        .ok_or(NormalizeError::MissingField("html_url"))?;
    Ok(NormalizedRepository {
        github_id: payload.id.to_string(),
        name: payload.name.clone(),
        url,
        is_private: payload.private,
        is_archived: payload.archived,
    })
}

pub fn normalize_pull_request(
    payload: &PullRequestPayload,
) -> Result<NormalizedPullRequest, NormalizeError> {
    let author = payload
        .user
        .clone()
        .ok_or(NormalizeError::MissingField("user"))?;
    let base_repo = payload
        .base
        .as_ref()
        .and_then(|base| base.repo.as_ref())
        .ok_or(NormalizeError::MissingField("base"))?;

    Ok(NormalizedPullRequest {
        github_id: payload.id.to_string(),
        number: payload.number,
        title: payload.title.clone(),
        author,
        base_repo_github_id: base_repo.id.to_string(),
        closed_at: payload.closed_at,
        merged_at: payload.merged_at,
        additions: payload.additions.unwrap_or(0),
        deletions: payload.deletions.unwrap_or(0),
        changed_files: payload.changed_files.unwrap_or(0),
        commit_count: payload.commits.unwrap_or(0),
    })
}

pub fn normalize_review(payload: &ReviewPayload) -> Result<NormalizedReview, NormalizeError> {
    let reviewer = payload
        .user
        .clone()
        .ok_or(NormalizeError::MissingField("user"))?;
    let state = payload
        .state
        .as_deref()
        .ok_or(NormalizeError::MissingField("state"))?;

    Ok(NormalizedReview {
        github_id: payload.id.to_string(),
        reviewer,
        state: ReviewState::from_github(state),
        submitted_at: payload.submitted_at,
    })
}

pub fn normalize_user(payload: &UserPayload) -> Result<NormalizedUser, NormalizeError> {
    if payload.login.is_empty() {
        return Err(NormalizeError::MissingField("login"));
    }
    Ok(NormalizedUser {
        github_id: payload.id.to_string(),
        login: payload.login.clone(),
        name: payload.name.clone(),
        email: payload.email.clone(),
        bio: payload.bio.clone(),
        company: payload.company.clone(),
        location: payload.location.clone(),
        blog: payload.blog.clone(),
        twitter_username: payload.twitter_username.clone(),
        public_repos: payload.public_repos,
        public_gists: payload.public_gists,
        followers: payload.followers,
        following: payload.following,
        github_created_at: payload.created_at,
        github_updated_at: payload.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pull_request_without_base_is_rejected() {
        let payload: PullRequestPayload = serde_json::from_value(json!({
            "id": 9001,
            "number": 12,
            "title": "Add pagination",
            "user": {"id": 7, "login": "alice"},
            "closed_at": null,
            "merged_at": null
        }))
        .unwrap();
        let err = normalize_pull_request(&payload).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("base")));
    }

    #[test]
    fn pull_request_without_author_is_rejected() {
        let payload: PullRequestPayload = serde_json::from_value(json!({
            "id": 9001,
            "number": 12,
            "title": "Add pagination",
            "base": {"repo": {"id": 1}}
        }))
        .unwrap();
        let err = normalize_pull_request(&payload).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("user")));
    }

    #[test]
    fn pull_request_maps_external_ids_and_defaults_counters() {
        let payload: PullRequestPayload = serde_json::from_value(json!({
            "id": 9001,
            "number": 12,
            "title": "Add pagination",
            "user": {"id": 7, "login": "alice"},
            "base": {"repo": {"id": 41}},
            "closed_at": "2025-05-01T12:00:00Z",
            "merged_at": null
        }))
        .unwrap();
        let normalized = normalize_pull_request(&payload).unwrap();
        assert_eq!(normalized.github_id, "9001");
        assert_eq!(normalized.base_repo_github_id, "41");
        assert_eq!(normalized.additions, 0);
        assert_eq!(normalized.commit_count, 0);
        // closed without merge
        assert!(!normalized.is_open());
        assert!(!normalized.is_merged());
    }

    #[test]
    fn review_states_map_from_wire_format() {
        assert_eq!(ReviewState::from_github("APPROVED"), ReviewState::Approved);
        assert_eq!(
            ReviewState::from_github("CHANGES_REQUESTED"),
            ReviewState::ChangesRequested
        );
        assert_eq!(ReviewState::from_github("DISMISSED"), ReviewState::Dismissed);
        assert_eq!(ReviewState::from_github("PENDING"), ReviewState::Commented);
    }

    #[test]
    fn review_without_state_is_rejected() {
        let payload: ReviewPayload = serde_json::from_value(json!({
            "id": 100,
            "user": {"id": 7, "login": "alice"},
            "submitted_at": null
        }))
        .unwrap();
        let err = normalize_review(&payload).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("state")));
    }

    #[test]
    fn repository_without_html_url_is_rejected() {
        let payload: RepoPayload = serde_json::from_value(json!({
            "id": 41,
            "name": "web"
        }))
        .unwrap();
        let err = normalize_repo(&payload).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingField("html_url")));
    }

    #[test]
    fn user_profile_keeps_optional_fields() {
        let payload: UserPayload = serde_json::from_value(json!({
            "id": 7,
            "login": "alice",
            "name": "Alice Doe",
            "followers": 12,
            "created_at": "2015-01-01T00:00:00Z"
        }))
        .unwrap();
        let normalized = normalize_user(&payload).unwrap();
        assert_eq!(normalized.github_id, "7");
        assert_eq!(normalized.name.as_deref(), Some("Alice Doe"));
        assert_eq!(normalized.followers, Some(12));
        assert!(normalized.email.is_none());
    }
}
