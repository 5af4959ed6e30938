//! Leaderboard ranking (spec §4.5): dense ranks by total_score desc, then
//! best_streak desc, then join order asc.

use serde::Serialize;

use crate::arcade::model::Player;

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub player_id: String,
    pub display_name: String,
    pub total_score: u64,
    pub best_streak: u32,
    pub is_teacher: bool,
}

/// Compute dense ranks over the full player list, in join order initially.
pub fn rank_players(players: &[Player]) -> Vec<LeaderboardEntry> {
    let mut indexed: Vec<(usize, &Player)> = players.iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        b.score
            .total_score
            .cmp(&a.score.total_score)
            .then(b.score.best_streak.cmp(&a.score.best_streak))
            .then(ia.cmp(ib))
    });

    let mut entries = Vec::with_capacity(indexed.len());
    let mut rank = 0u32;
    let mut last_key: Option<(u64, u32)> = None;
    for (_, player) in indexed {
        let key = (player.score.total_score, player.score.best_streak);
        if last_key != Some(key) {
            rank += 1;
            last_key = Some(key);
        }
        entries.push(LeaderboardEntry {
            rank,
            player_id: player.player_id.0.to_string(),
            display_name: player.display_name.clone(),
            total_score: player.score.total_score,
            best_streak: player.score.best_streak,
            is_teacher: player.is_teacher,
        });
    }
    entries
}

/// Top-5 entries plus, if the given player falls outside them, their own
/// entry appended at the end.
pub fn leaderboard_view_for(entries: &[LeaderboardEntry], player_id: &str) -> Vec<LeaderboardEntry> {
    let mut view: Vec<LeaderboardEntry> = entries.iter().take(5).cloned().collect();
    if !view.iter().any(|e| e.player_id == player_id) {
        if let Some(own) = entries.iter().find(|e| e.player_id == player_id) {
            view.push(own.clone());
        }
    }
    view
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arcade::model::Player;
    use crate::arcade::scoring::ScoreState;

    fn player_with(name: &str, total: u64, streak: u32) -> Player {
        let mut p = Player::new(name.to_string(), false);
        p.score = ScoreState {
            total_score: total,
            best_streak: streak,
            ..Default::default()
        };
        p
    }

    #[test]
    fn ranks_are_dense_and_ties_break_by_streak_then_join_order() {
        let players = vec![
            player_with("A", 100, 2),
            player_with("B", 100, 5),
            player_with("C", 50, 0),
            player_with("D", 100, 5),
        ];
        let entries = rank_players(&players);
        assert_eq!(entries[0].display_name, "B");
        assert_eq!(entries[0].rank, 1);
        assert_eq!(entries[1].display_name, "D");
        assert_eq!(entries[1].rank, 1);
        assert_eq!(entries[2].display_name, "A");
        assert_eq!(entries[2].rank, 2);
        assert_eq!(entries[3].display_name, "C");
        assert_eq!(entries[3].rank, 3);
    }

    #[test]
    fn view_includes_own_rank_outside_top_five() {
        let players: Vec<Player> = (0..7)
            .map(|i| player_with(&format!("P{i}"), (100 - i) as u64, 0))
            .collect();
        let entries = rank_players(&players);
        let last_id = entries.last().unwrap().player_id.clone();
        let view = leaderboard_view_for(&entries, &last_id);
        assert_eq!(view.len(), 6);
        assert_eq!(view.last().unwrap().player_id, last_id);
    }
}
