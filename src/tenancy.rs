use axum::http::{header::HOST, HeaderMap};
use uuid::Uuid;

use crate::db::organization_repository::OrganizationRepository;
use crate::models::organization::Organization;

/// Fallback tenant header for deployments that don't use subdomains.
pub const ORG_HEADER: &str = "X-Org";

/// What tenant resolution knows about the caller, lifted out of the access
/// token. `active_org` is the organization picked at signup/login or via
/// /switch-org.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub active_org: Option<Uuid>,
}

/// Determine the active organization for a request. First match wins:
///
/// 1. Host subdomain: `tenant.example.com` -> slug `tenant` (only when the
///    host has more than two dot-separated labels).
/// 2. The `X-Org` header, as a slug.
/// 3. Authenticated fallback: the token's active organization if the caller
///    still holds a membership there, otherwise the caller's earliest
///    membership by join date.
///
/// A miss is not an error; handlers decide between 404 and 403.
pub async fn resolve_organization(
    orgs: &dyn OrganizationRepository,
    headers: &HeaderMap,
    auth: Option<&AuthContext>,
) -> Result<Option<Organization>, sqlx::Error> {
    if let Some(host) = headers.get(HOST).and_then(|v| v.to_str().ok()) {
        let host = host.split(':').next().unwrap_or(host);
        let labels: Vec<&str> = host.split('.').collect();
        if labels.len() > 2 {
            if let Some(org) = orgs.find_by_slug(labels[0]).await? {
                return Ok(Some(org));
            }
        }
    }

    if let Some(slug) = headers.get(ORG_HEADER).and_then(|v| v.to_str().ok()) {
        if let Some(org) = orgs.find_by_slug(slug).await? {
            return Ok(Some(org));
        }
    }

    if let Some(auth) = auth {
        if let Some(org_id) = auth.active_org {
            if orgs.find_membership(auth.user_id, org_id).await?.is_some() {
                if let Some(org) = orgs.find_by_id(org_id).await? {
                    return Ok(Some(org));
                }
            }
        }

        let memberships = orgs.list_memberships_for_user(auth.user_id).await?;
        if let Some(first) = memberships.into_iter().next() {
            return Ok(Some(first.organization));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{test_org, MockOrganizationRepository};
    use crate::models::organization::OrgRole;
    use axum::http::HeaderValue;
    use time::{Duration, OffsetDateTime};

    fn headers(host: Option<&str>, org_header: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        if let Some(host) = host {
            map.insert(HOST, HeaderValue::from_str(host).unwrap());
        }
        if let Some(slug) = org_header {
            map.insert(ORG_HEADER, HeaderValue::from_str(slug).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn subdomain_wins_over_header() {
        let repo = MockOrganizationRepository::with_orgs(vec![
            test_org("Acme Inc", "acme-inc"),
            test_org("Globex", "globex"),
        ]);

        let resolved = resolve_organization(
            &repo,
            &headers(Some("acme-inc.example.com:8000"), Some("globex")),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(resolved.slug, "acme-inc");
    }

    #[tokio::test]
    async fn bare_domain_falls_through_to_header() {
        let repo = MockOrganizationRepository::with_orgs(vec![test_org("Globex", "globex")]);

        let resolved = resolve_organization(
            &repo,
            &headers(Some("example.com"), Some("globex")),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(resolved.slug, "globex");
    }

    #[tokio::test]
    async fn unknown_subdomain_slug_falls_through() {
        let repo = MockOrganizationRepository::with_orgs(vec![test_org("Globex", "globex")]);

        let resolved = resolve_organization(
            &repo,
            &headers(Some("nonexistent.example.com"), Some("globex")),
            None,
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(resolved.slug, "globex");
    }

    #[tokio::test]
    async fn active_org_claim_beats_earliest_membership() {
        let older = test_org("Older", "older");
        let newer = test_org("Newer", "newer");
        let repo =
            MockOrganizationRepository::with_orgs(vec![older.clone(), newer.clone()]);

        let user_id = Uuid::new_v4();
        let base = OffsetDateTime::now_utc();
        repo.insert_membership_at(user_id, older.id, OrgRole::Admin, base - Duration::days(2));
        repo.insert_membership_at(user_id, newer.id, OrgRole::Employee, base);

        let auth = AuthContext {
            user_id,
            active_org: Some(newer.id),
        };
        let resolved = resolve_organization(&repo, &headers(None, None), Some(&auth))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, newer.id);
    }

    #[tokio::test]
    async fn stale_active_org_falls_back_to_earliest_membership() {
        let older = test_org("Older", "older");
        let newer = test_org("Newer", "newer");
        let repo =
            MockOrganizationRepository::with_orgs(vec![older.clone(), newer.clone()]);

        let user_id = Uuid::new_v4();
        let base = OffsetDateTime::now_utc();
        repo.insert_membership_at(user_id, newer.id, OrgRole::Employee, base);
        repo.insert_membership_at(user_id, older.id, OrgRole::Admin, base - Duration::days(2));

        // Claims point at an org the user no longer belongs to.
        let auth = AuthContext {
            user_id,
            active_org: Some(Uuid::new_v4()),
        };
        let resolved = resolve_organization(&repo, &headers(None, None), Some(&auth))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.id, older.id, "earliest joined_at must win");
    }

    #[tokio::test]
    async fn no_signal_resolves_to_none() {
        let repo = MockOrganizationRepository::default();

        let resolved = resolve_organization(&repo, &headers(Some("example.com"), None), None)
            .await
            .unwrap();
        assert!(resolved.is_none());

        let auth = AuthContext {
            user_id: Uuid::new_v4(),
            active_org: None,
        };
        let resolved = resolve_organization(&repo, &headers(None, None), Some(&auth))
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
