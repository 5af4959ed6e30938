//! End-of-session award catalogue (spec §4.5 / §9): exactly five awards,
//! ties broken by join order.

use serde::Serialize;

use crate::arcade::model::Player;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AwardKind {
    TopScore,
    LongestStreak,
    MostImproved,
    QuickestMind,
    ComebackKing,
}

#[derive(Debug, Clone, Serialize)]
pub struct Award {
    pub kind: AwardKind,
    pub player_id: String,
    pub display_name: String,
}

/// Compute the fixed award catalogue from final player snapshots, in join
/// order (the order `players` is given in, per the session's insertion
/// order).
pub fn compute_awards(players: &[Player]) -> Vec<Award> {
    let mut awards = Vec::new();

    if let Some((idx, p)) = players
        .iter()
        .enumerate()
        .max_by(|(ia, a), (ib, b)| {
            a.score
                .total_score
                .cmp(&b.score.total_score)
                .then(ib.cmp(ia))
        })
    {
        let _ = idx;
        awards.push(Award {
            kind: AwardKind::TopScore,
            player_id: p.player_id.0.to_string(),
            display_name: p.display_name.clone(),
        });
    }

    if let Some((idx, p)) = players.iter().enumerate().max_by(|(ia, a), (ib, b)| {
        a.score
            .best_streak
            .cmp(&b.score.best_streak)
            .then(ib.cmp(ia))
    }) {
        let _ = idx;
        awards.push(Award {
            kind: AwardKind::LongestStreak,
            player_id: p.player_id.0.to_string(),
            display_name: p.display_name.clone(),
        });
    }

    if let Some((idx, p)) = players.iter().enumerate().max_by(|(ia, a), (ib, b)| {
        improvement_delta(a)
            .cmp(&improvement_delta(b))
            .then(ib.cmp(ia))
    }) {
        let _ = idx;
        awards.push(Award {
            kind: AwardKind::MostImproved,
            player_id: p.player_id.0.to_string(),
            display_name: p.display_name.clone(),
        });
    }

    if let Some((idx, p)) = players
        .iter()
        .enumerate()
        .filter(|(_, p)| p.score.questions_answered >= 5)
        .min_by(|(ia, a), (ib, b)| {
            a.score
                .avg_time_ms()
                .partial_cmp(&b.score.avg_time_ms())
                .unwrap()
                .then(ia.cmp(ib))
        })
    {
        let _ = idx;
        awards.push(Award {
            kind: AwardKind::QuickestMind,
            player_id: p.player_id.0.to_string(),
            display_name: p.display_name.clone(),
        });
    }

    if let Some((idx, p)) = players.iter().enumerate().max_by(|(ia, a), (ib, b)| {
        credits_used(a)
            .partial_cmp(&credits_used(b))
            .unwrap()
            .then(ib.cmp(ia))
    }) {
        let _ = idx;
        awards.push(Award {
            kind: AwardKind::ComebackKing,
            player_id: p.player_id.0.to_string(),
            display_name: p.display_name.clone(),
        });
    }

    awards
}

fn improvement_delta(p: &Player) -> i64 {
    match (p.run_score_history.first(), p.run_score_history.last()) {
        (Some(first), Some(last)) => *last as i64 - *first as i64,
        _ => i64::MIN,
    }
}

/// Ratio of comeback credits actually consumed to deaths survived, i.e.
/// how often a death was cushioned by a comeback credit.
fn credits_used(p: &Player) -> f64 {
    let deaths = p.run_score_history.len();
    if deaths == 0 {
        0.0
    } else {
        p.score.comebacks_used as f64 / deaths as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcade::scoring::ScoreState;

    fn player(name: &str, total: u64, streak: u32, answered: u32, avg_ms: u64) -> Player {
        let mut p = Player::new(name.to_string(), false);
        p.score = ScoreState {
            total_score: total,
            best_streak: streak,
            questions_answered: answered,
            questions_correct: answered,
            total_answer_time_ms: avg_ms * answered as u64,
            ..Default::default()
        };
        p
    }

    #[test]
    fn produces_exactly_five_awards_when_eligible() {
        let players = vec![
            player("A", 300, 6, 6, 2000),
            player("B", 100, 2, 1, 5000),
            player("C", 200, 9, 8, 1000),
        ];
        let awards = compute_awards(&players);
        assert_eq!(awards.len(), 5);
        assert_eq!(awards[0].kind, AwardKind::TopScore);
        assert_eq!(awards[0].display_name, "A");
        assert_eq!(awards[1].kind, AwardKind::LongestStreak);
        assert_eq!(awards[1].display_name, "C");
    }

    #[test]
    fn quickest_mind_skipped_when_nobody_answered_five() {
        let players = vec![player("A", 100, 1, 2, 1000)];
        let awards = compute_awards(&players);
        assert!(!awards.iter().any(|a| a.kind == AwardKind::QuickestMind));
    }
}
