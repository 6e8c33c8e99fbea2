use crate::aggregator::{ParentPost, RawActivity, RawComment};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use persona_core::{
    CommentGroup, CommentRecord, CommunityInfo, ExportDocument, PostRecord, SummaryStats,
    UserProfile,
};

/// Turn raw activity into the export document.
///
/// Comments are grouped under their parent submission, groups in the order
/// their first comment was fetched and comments inside a group oldest first.
/// `fetched_at` stamps the document and anchors the account age.
pub fn normalize(raw: RawActivity, fetched_at: DateTime<Utc>) -> ExportDocument {
    let RawActivity {
        profile,
        comments,
        parents,
        posts,
        communities,
        degradations: _,
    } = raw;

    let groups = group_comments(comments, parents);
    let summary = summarize(&profile, &posts, &groups, &communities, fetched_at);

    ExportDocument {
        exported_at: fetched_at,
        user_info: profile,
        summary,
        subreddits_master: communities,
        comments: groups,
        posts,
    }
}

fn group_comments(
    comments: Vec<RawComment>,
    mut parents: IndexMap<String, ParentPost>,
) -> Vec<CommentGroup> {
    let mut grouped: IndexMap<String, Vec<CommentRecord>> = IndexMap::new();
    for comment in comments {
        grouped
            .entry(comment.parent_id)
            .or_default()
            .push(CommentRecord {
                body: comment.body,
                created_at: comment.created_at,
                url: comment.url,
                emotions: None,
            });
    }

    grouped
        .into_iter()
        .filter_map(|(parent_id, mut records)| {
            let parent = parents.swap_remove(&parent_id)?;
            records.sort_by_key(|record| record.created_at);
            Some(CommentGroup {
                post_info: parent.post_info,
                subreddit: parent.subreddit,
                comments: records,
            })
        })
        .collect()
}

/// Summary counts. The most active community is the one with the highest
/// interaction count; the first one reached wins a tie.
pub fn summarize(
    profile: &UserProfile,
    posts: &[PostRecord],
    groups: &[CommentGroup],
    communities: &IndexMap<String, CommunityInfo>,
    fetched_at: DateTime<Utc>,
) -> SummaryStats {
    let mut most_active: Option<(&str, u64)> = None;
    for (name, info) in communities {
        if info.interactions_count == 0 {
            continue;
        }
        match most_active {
            Some((_, best)) if info.interactions_count <= best => {}
            _ => most_active = Some((name.as_str(), info.interactions_count)),
        }
    }

    SummaryStats {
        total_posts: posts.len(),
        total_comments: groups.iter().map(|group| group.comments.len()).sum(),
        unique_subreddits: communities.len(),
        most_active_subreddit: most_active.map(|(name, _)| name.to_string()),
        account_age_days: (fetched_at - profile.created_at).num_days(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use persona_core::PostInfo;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn profile() -> UserProfile {
        UserProfile {
            username: "someone".to_string(),
            created_at: at(1_600_000_000),
            link_karma: 10,
            comment_karma: 20,
            trophies: vec![],
            icon_img: None,
            profile_url: UserProfile::profile_url_for("someone"),
        }
    }

    fn parent(title: &str, subreddit: &str) -> ParentPost {
        ParentPost {
            post_info: PostInfo {
                title: title.to_string(),
                body: String::new(),
                created_at: at(1_650_000_000),
                reddit_url: format!("https://www.reddit.com/r/{}/comments/{}/", subreddit, title),
                flair: None,
            },
            subreddit: subreddit.to_string(),
        }
    }

    fn comment(parent_id: &str, body: &str, created: i64) -> RawComment {
        RawComment {
            parent_id: parent_id.to_string(),
            body: body.to_string(),
            created_at: at(created),
            url: format!("https://www.reddit.com/c/{}", body),
        }
    }

    fn community(name: &str, count: u64) -> (String, CommunityInfo) {
        let mut info = CommunityInfo::placeholder(name);
        info.interactions_count = count;
        (name.to_string(), info)
    }

    fn raw(comments: Vec<RawComment>, communities: Vec<(String, CommunityInfo)>) -> RawActivity {
        let mut parents = IndexMap::new();
        parents.insert("t3_a".to_string(), parent("a", "rust"));
        parents.insert("t3_b".to_string(), parent("b", "golang"));
        RawActivity {
            profile: profile(),
            comments,
            parents,
            posts: vec![],
            communities: communities.into_iter().collect(),
            degradations: vec![],
        }
    }

    #[test]
    fn test_groups_follow_first_seen_parent_and_sort_by_time() {
        let doc = normalize(
            raw(
                vec![
                    comment("t3_b", "b-late", 300),
                    comment("t3_a", "a-late", 200),
                    comment("t3_b", "b-early", 100),
                    comment("t3_a", "a-early", 50),
                ],
                vec![community("golang", 2), community("rust", 2)],
            ),
            at(1_700_000_000),
        );

        let titles: Vec<_> = doc.comments.iter().map(|g| g.post_info.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a"]);
        let bodies: Vec<_> = doc.comments[0].comments.iter().map(|c| c.body.as_str()).collect();
        assert_eq!(bodies, vec!["b-early", "b-late"]);
        assert_eq!(doc.summary.total_comments, 4);
    }

    #[test]
    fn test_most_active_tie_goes_to_first_seen() {
        let doc = normalize(
            raw(vec![], vec![community("golang", 3), community("rust", 3), community("c", 1)]),
            at(1_700_000_000),
        );
        assert_eq!(doc.summary.most_active_subreddit.as_deref(), Some("golang"));
        assert_eq!(doc.summary.unique_subreddits, 3);
    }

    #[test]
    fn test_empty_activity_summary() {
        let doc = normalize(raw(vec![], vec![]), at(1_600_000_000 + 86_400 * 10 + 5));
        assert_eq!(doc.summary.total_posts, 0);
        assert_eq!(doc.summary.total_comments, 0);
        assert_eq!(doc.summary.unique_subreddits, 0);
        assert_eq!(doc.summary.most_active_subreddit, None);
        assert_eq!(doc.summary.account_age_days, 10);
        assert!(doc.comments.is_empty());
    }
}
