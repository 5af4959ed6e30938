//! Question Source (spec §4.3): math generator and bank sampler behind one
//! trait so the session actor is agnostic to which is configured.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::arcade::model::{BankQuestionSpec, MathConfig, Operation, Question};
use crate::core::{question_id_for_math, DeterministicRng};

/// Produces the next question for a player, enforcing no-repeat within a
/// session. Implementations are session-scoped and single-writer (owned by
/// the session actor), so no internal synchronization is needed.
pub trait QuestionSource: Send {
    /// Draw the next question for a player, given the set of question ids
    /// already served to that player and (for the bank sampler) their
    /// recency queue.
    fn next_for_player(
        &mut self,
        seen_by_player: &HashSet<String>,
        recent_by_player: &VecDeque<String>,
    ) -> Question;
}

/// Deterministically generates arithmetic problems from a seeded RNG.
pub struct MathGenerator {
    rng: DeterministicRng,
    config: MathConfig,
}

impl MathGenerator {
    pub fn new(rng: DeterministicRng, config: MathConfig) -> Self {
        Self { rng, config }
    }

    fn sample_operands(&mut self, op: Operation) -> (i64, i64) {
        let min = self.config.min_operand;
        let max = self.config.max_operand.max(min);
        loop {
            let a = self.rng.next_int_range(min, max);
            let b = self.rng.next_int_range(min, max);
            match op {
                Operation::Sub if a < b => continue,
                Operation::Div if b == 0 || a % b != 0 => continue,
                _ => return (a, b),
            }
        }
    }

    fn answer_for(op: Operation, a: i64, b: i64) -> i64 {
        match op {
            Operation::Add => a + b,
            Operation::Sub => a - b,
            Operation::Mul => a * b,
            Operation::Div => a / b,
        }
    }

    /// Build one question, retrying with freshly sampled operands if the
    /// derived question_id has already been served to this player.
    fn draw(&mut self, seen_by_player: &HashSet<String>) -> Question {
        const MAX_ATTEMPTS: u32 = 64;
        let ops = if self.config.operations.is_empty() {
            vec![Operation::Add]
        } else {
            self.config.operations.clone()
        };

        let mut question = None;
        for _ in 0..MAX_ATTEMPTS {
            let op = *self.rng.choose(&ops).unwrap();
            let (a, b) = self.sample_operands(op);
            let id = question_id_for_math(a, op.tag(), b);
            if !seen_by_player.contains(&id) {
                question = Some(self.build_question(id, op, a, b));
                break;
            }
        }
        // Exhausted retries (tiny operand range + large history): allow a
        // repeat rather than stall the player.
        question.unwrap_or_else(|| {
            let op = *self.rng.choose(&ops).unwrap();
            let (a, b) = self.sample_operands(op);
            let id = question_id_for_math(a, op.tag(), b);
            self.build_question(id, op, a, b)
        })
    }

    fn build_question(&mut self, question_id: String, op: Operation, a: i64, b: i64) -> Question {
        let correct = Self::answer_for(op, a, b);
        let mut distractors: Vec<i64> = vec![correct + 1, correct - 1, correct + 2, correct - 2];
        if let Operation::Add | Operation::Mul = op {
            // operand-swap distractor collapses to the same value for
            // commutative ops, so widen with a scaled perturbation instead.
            distractors.push(correct + 3);
        } else {
            distractors.push(Self::answer_for(op, b, a));
        }
        distractors.retain(|d| *d != correct);
        distractors.sort_unstable();
        distractors.dedup();
        self.rng.shuffle(&mut distractors);
        distractors.truncate(3);
        while distractors.len() < 3 {
            let filler = correct + 10 + distractors.len() as i64;
            if !distractors.contains(&filler) {
                distractors.push(filler);
            }
        }

        let mut options: Vec<i64> = distractors;
        options.push(correct);
        self.rng.shuffle(&mut options);
        let correct_index = options.iter().position(|v| *v == correct).unwrap() as u8;

        Question {
            question_id,
            text: format!("{a} {} {b}", op.symbol()),
            options: [
                options[0].to_string(),
                options[1].to_string(),
                options[2].to_string(),
                options[3].to_string(),
            ],
            correct_index,
            category: Some("math".to_string()),
            difficulty: None,
        }
    }
}

impl QuestionSource for MathGenerator {
    fn next_for_player(
        &mut self,
        seen_by_player: &HashSet<String>,
        _recent_by_player: &VecDeque<String>,
    ) -> Question {
        self.draw(seen_by_player)
    }
}

/// Samples from a fixed question bank, preferring unseen questions and
/// falling back to least-recently-used once a player has seen them all.
pub struct BankSampler {
    rng: DeterministicRng,
    questions: Vec<Question>,
    last_used_at: HashMap<String, u64>,
    clock: u64,
}

impl BankSampler {
    pub fn new(rng: DeterministicRng, specs: Vec<BankQuestionSpec>) -> Self {
        let questions = specs
            .into_iter()
            .enumerate()
            .map(|(i, spec)| Question {
                question_id: format!("bank-{i}"),
                text: spec.text,
                options: spec.options,
                correct_index: spec.correct_index,
                category: spec.category,
                difficulty: spec.difficulty,
            })
            .collect();
        Self {
            rng,
            questions,
            last_used_at: HashMap::new(),
            clock: 0,
        }
    }
}

impl QuestionSource for BankSampler {
    fn next_for_player(
        &mut self,
        seen_by_player: &HashSet<String>,
        _recent_by_player: &VecDeque<String>,
    ) -> Question {
        self.clock += 1;

        let unseen: Vec<&Question> = self
            .questions
            .iter()
            .filter(|q| !seen_by_player.contains(&q.question_id))
            .collect();

        let chosen = if !unseen.is_empty() {
            *self.rng.choose(&unseen).expect("unseen is non-empty")
        } else {
            self.questions
                .iter()
                .min_by_key(|q| {
                    self.last_used_at
                        .get(&q.question_id)
                        .copied()
                        .unwrap_or(0)
                })
                .expect("bank is non-empty")
        };

        let id = chosen.question_id.clone();
        let question = chosen.clone();
        self.last_used_at.insert(id, self.clock);
        question
    }
}
