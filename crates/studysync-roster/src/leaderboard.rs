//! Ranked view of a roster.

use studysync_protocol::LeaderboardEntry;

use crate::Participant;

/// Builds the visible leaderboard.
///
/// Only active participants appear. They are ordered by `time_spent`,
/// highest first; ties keep roster order. Ranks start at 1.
pub fn derive(participants: &[Participant]) -> Vec<LeaderboardEntry> {
    let mut board: Vec<&Participant> = participants.iter().filter(|p| p.is_active()).collect();
    // `sort_by` is stable, so equal times stay in join order.
    board.sort_by(|a, b| b.time_spent.cmp(&a.time_spent));

    board
        .into_iter()
        .enumerate()
        .map(|(i, p)| LeaderboardEntry {
            name: p.name.clone(),
            user_id: p.user_id,
            joined_at: p.joined_at,
            status: p.status,
            time_spent: p.time_spent,
            rank: i + 1,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use studysync_protocol::{ParticipantStatus, UserId};

    fn participant(id: u64, name: &str, time_spent: u64) -> Participant {
        Participant {
            time_spent,
            ..Participant::new(UserId(id), name.into(), id * 1_000)
        }
    }

    #[test]
    fn test_derive_ranks_by_time_spent_descending() {
        let roster = vec![
            participant(1, "Ann", 10),
            participant(2, "Ben", 30),
            participant(3, "Cat", 20),
        ];
        let board = derive(&roster);

        let names: Vec<_> = board.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Ben", "Cat", "Ann"]);
        let ranks: Vec<_> = board.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, [1, 2, 3]);
    }

    #[test]
    fn test_derive_keeps_join_order_for_ties() {
        let roster = vec![
            participant(1, "First", 5),
            participant(2, "Top", 9),
            participant(3, "Second", 5),
        ];
        let board = derive(&roster);

        assert_eq!(board[0].name, "Top");
        assert_eq!(board[1].name, "First");
        assert_eq!(board[1].rank, 2);
        assert_eq!(board[2].name, "Second");
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn test_derive_excludes_left_and_completed() {
        let mut roster = vec![
            participant(1, "Here", 1),
            participant(2, "Gone", 50),
            participant(3, "Done", 60),
        ];
        roster[1].status = ParticipantStatus::Left;
        roster[2].status = ParticipantStatus::Completed;

        let board = derive(&roster);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].name, "Here");
        assert_eq!(board[0].rank, 1);
    }

    #[test]
    fn test_derive_empty_roster() {
        assert!(derive(&[]).is_empty());
    }

    #[test]
    fn test_derive_copies_identity_fields() {
        let board = derive(&[participant(4, "Dee", 7)]);
        assert_eq!(board[0].user_id, UserId(4));
        assert_eq!(board[0].joined_at, 4_000);
        assert_eq!(board[0].time_spent, 7);
        assert_eq!(board[0].status, ParticipantStatus::Active);
    }
}
