use std::collections::HashMap;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::{ApiClient, ApiError};
use crate::payload::Row;

/// Rank tier in the MLM hierarchy, lowest to highest.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cadre {
    #[serde(rename = "APM")]
    Apm,
    #[serde(rename = "PM")]
    Pm,
    #[serde(rename = "DO")]
    Do,
    #[serde(rename = "MD")]
    Md,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Cadre {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "APM" => Some(Cadre::Apm),
            "PM" => Some(Cadre::Pm),
            "DO" => Some(Cadre::Do),
            "MD" => Some(Cadre::Md),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Cadre::Apm => "APM",
            Cadre::Pm => "PM",
            Cadre::Do => "DO",
            Cadre::Md => "MD",
            Cadre::Unknown => "UNKNOWN",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Venture {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub total_plots: u64,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Property {
    pub id: u64,
    #[serde(default)]
    pub venture_id: u64,
    #[serde(default)]
    pub plot_no: String,
    #[serde(default)]
    pub facing: String,
    #[serde(default)]
    pub area_sqyds: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub status: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Member {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub cadre: Cadre,
    #[serde(default)]
    pub sponsor_id: Option<u64>,
    #[serde(default)]
    pub dip_amount: f64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallLog {
    pub id: u64,
    #[serde(default)]
    pub caller: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub called_at: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct VisitorLog {
    pub id: u64,
    #[serde(default)]
    pub visitor: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub venture_id: u64,
    #[serde(default)]
    pub visited_at: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExpenseBill {
    pub id: u64,
    #[serde(default)]
    pub head: String,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub billed_on: String,
    #[serde(default)]
    pub approved: bool,
}

/// Deserializes table rows into typed models, skipping rows that do not
/// fit. List screens stay row-based; typed models are for report math.
pub fn rows_to<T: DeserializeOwned>(rows: &[Row]) -> Vec<T> {
    rows.iter()
        .filter_map(|row| serde_json::from_value(Value::Object(row.clone())).ok())
        .collect()
}

/// Hard stop for `fetch_all_pages` in case a server reports a bogus
/// `last_page`.
const MAX_PAGES: u64 = 500;

/// Walks a server-paginated listing page by page into one local row set,
/// trusting the server's `last_page`. A flat response means the endpoint
/// does not paginate and is returned as-is.
pub async fn fetch_all_pages(
    client: &ApiClient,
    path: &str,
    base_query: &[(&str, String)],
    mut on_page: impl FnMut(u64, u64),
) -> Result<Vec<Row>, ApiError> {
    let mut rows: Vec<Row> = Vec::new();
    let mut page: u64 = 1;
    loop {
        let mut query: Vec<(&str, String)> = base_query.to_vec();
        query.push(("page", page.to_string()));
        let payload = client.get_payload(path, &query).await?;
        rows.extend(payload.rows());
        match payload.meta() {
            None => return Ok(rows),
            Some(meta) => {
                let last = meta.last_page.min(MAX_PAGES);
                on_page(page, last);
                if page >= last {
                    return Ok(rows);
                }
                page += 1;
            }
        }
    }
}

/// Records an incoming call at the front desk.
pub async fn log_call(
    client: &ApiClient,
    caller: &str,
    phone: &str,
    purpose: &str,
) -> Result<Value, ApiError> {
    client
        .post(
            "call-logs",
            &serde_json::json!({
                "caller": caller,
                "phone": phone,
                "purpose": purpose,
            }),
        )
        .await
}

pub async fn approve_expense(client: &ApiClient, bill_id: u64) -> Result<Value, ApiError> {
    client
        .put(
            &format!("expense-bills/{bill_id}"),
            &serde_json::json!({"approved": true}),
        )
        .await
}

pub async fn delete_call_log(client: &ApiClient, id: u64) -> Result<Value, ApiError> {
    client.delete(&format!("call-logs/{id}")).await
}

pub const DASHBOARD_ENDPOINTS: [&str; 6] = [
    "ventures",
    "properties",
    "members",
    "call-logs",
    "visitor-logs",
    "expense-bills",
];

/// Record counts for the landing dashboard, fetched concurrently. Each
/// endpoint fails independently; one broken screen never blanks the rest.
pub async fn dashboard_counts(client: &ApiClient) -> Vec<(&'static str, Result<u64, ApiError>)> {
    let mut futs = FuturesUnordered::new();
    for path in DASHBOARD_ENDPOINTS {
        let client = client.clone();
        futs.push(async move {
            let count = client.get_payload(path, &[]).await.map(|p| match p.meta() {
                Some(meta) => meta.total,
                None => p.items().len() as u64,
            });
            (path, count)
        });
    }
    let mut out: Vec<(&'static str, Result<u64, ApiError>)> = Vec::new();
    while let Some(item) = futs.next().await {
        out.push(item);
    }
    out.sort_by_key(|(name, _)| DASHBOARD_ENDPOINTS.iter().position(|p| p == name));
    out
}

/// One level of a member's downline in the commission hierarchy report.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeamLevel {
    pub depth: usize,
    pub members: usize,
    pub dip_total: f64,
    pub cadre_counts: Vec<(Cadre, usize)>,
}

/// Builds the downline report for `root_id` from a flat member list by
/// following sponsor links breadth-first. Level 0 is the root member
/// itself. Cycles in sponsor data terminate via the visited set.
pub fn team_levels(members: &[Member], root_id: u64) -> Vec<TeamLevel> {
    let mut children: HashMap<u64, Vec<&Member>> = HashMap::new();
    let mut by_id: HashMap<u64, &Member> = HashMap::new();
    for m in members {
        by_id.insert(m.id, m);
        if let Some(sponsor) = m.sponsor_id {
            children.entry(sponsor).or_default().push(m);
        }
    }

    let Some(root) = by_id.get(&root_id) else {
        return Vec::new();
    };

    let mut levels: Vec<TeamLevel> = Vec::new();
    let mut frontier: Vec<&Member> = vec![root];
    let mut visited: std::collections::HashSet<u64> = std::collections::HashSet::new();
    visited.insert(root_id);
    let mut depth = 0usize;

    while !frontier.is_empty() {
        let mut cadre_counts: HashMap<Cadre, usize> = HashMap::new();
        let mut dip_total = 0.0;
        for m in frontier.iter() {
            *cadre_counts.entry(m.cadre).or_default() += 1;
            dip_total += m.dip_amount;
        }
        let mut cadre_counts: Vec<(Cadre, usize)> = cadre_counts.into_iter().collect();
        cadre_counts.sort_by_key(|(c, _)| c.as_str());
        levels.push(TeamLevel {
            depth,
            members: frontier.len(),
            dip_total,
            cadre_counts,
        });

        let mut next: Vec<&Member> = Vec::new();
        for m in frontier.iter() {
            if let Some(subs) = children.get(&m.id) {
                for sub in subs {
                    if visited.insert(sub.id) {
                        next.push(sub);
                    }
                }
            }
        }
        frontier = next;
        depth += 1;
    }

    levels
}

/// Fetches every member page and assembles the team report for one member.
pub async fn team_report(client: &ApiClient, root_id: u64) -> Result<Vec<TeamLevel>, ApiError> {
    let rows = fetch_all_pages(client, "members", &[], |_, _| {}).await?;
    let members: Vec<Member> = rows_to(&rows);
    Ok(team_levels(&members, root_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64, sponsor: Option<u64>, cadre: Cadre, dip: f64) -> Member {
        Member {
            id,
            name: format!("m{id}"),
            cadre,
            sponsor_id: sponsor,
            dip_amount: dip,
            ..Default::default()
        }
    }

    #[test]
    fn team_levels_walk_the_downline_breadth_first() {
        let members = vec![
            member(1, None, Cadre::Md, 0.0),
            member(2, Some(1), Cadre::Do, 100.0),
            member(3, Some(1), Cadre::Do, 50.0),
            member(4, Some(2), Cadre::Apm, 25.0),
        ];
        let levels = team_levels(&members, 1);
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[0].members, 1);
        assert_eq!(levels[1].members, 2);
        assert_eq!(levels[1].dip_total, 150.0);
        assert_eq!(levels[2].members, 1);
        assert_eq!(levels[2].cadre_counts, vec![(Cadre::Apm, 1)]);
    }

    #[test]
    fn team_levels_tolerate_sponsor_cycles() {
        let members = vec![
            member(1, Some(2), Cadre::Pm, 0.0),
            member(2, Some(1), Cadre::Pm, 0.0),
        ];
        let levels = team_levels(&members, 1);
        assert_eq!(levels.len(), 2);
    }

    #[test]
    fn unknown_member_yields_no_levels() {
        assert!(team_levels(&[], 7).is_empty());
    }

    #[test]
    fn cadre_parses_case_insensitively() {
        assert_eq!(Cadre::parse(" md "), Some(Cadre::Md));
        assert_eq!(Cadre::parse("apm"), Some(Cadre::Apm));
        assert_eq!(Cadre::parse("boss"), None);
    }

    #[test]
    fn rows_to_skips_rows_that_do_not_fit() {
        let good: Row = serde_json::from_str(r#"{"id": 1, "name": "A", "cadre": "PM"}"#).unwrap();
        let bad: Row = serde_json::from_str(r#"{"id": "not-a-number"}"#).unwrap();
        let members: Vec<Member> = rows_to(&[good, bad]);
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].cadre, Cadre::Pm);
    }
}
