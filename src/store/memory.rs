// src/store/memory.rs

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::assignment::Assignment;
use crate::models::attempt::{Attempt, AttemptStatus};
use crate::models::question::Question;
use crate::models::result::AssignmentResult;
use crate::models::submission::Submission;
use crate::models::user::User;

use super::{
    AssignmentPatch, NewAssignment, NewAttempt, NewQuestion, NewSubmission, NewUser, Store,
    StoreError,
};

#[derive(Default)]
struct Inner {
    next_id: i64,
    users: Vec<User>,
    assignments: Vec<Assignment>,
    questions: Vec<Question>,
    attempts: Vec<Attempt>,
    submissions: Vec<Submission>,
    results: Vec<AssignmentResult>,
    /// (part_id, student_id) completion marks.
    progress: Vec<(i64, i64)>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory [`Store`] with the same constraint semantics as [`super::PgStore`].
///
/// The single mutex serializes every operation, which is exactly the
/// atomicity the trait contract asks for. Used as the test double; never
/// wired into the production binary.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("store mutex poisoned")
    }

    /// Whether the completion sink was notified for this (part, student).
    pub fn part_completed(&self, part_id: i64, student_id: i64) -> bool {
        self.lock().progress.contains(&(part_id, student_id))
    }
}

#[async_trait]
impl Store for MemStore {
    async fn create_user(&self, new: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock();
        if inner.users.iter().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict(format!(
                "Username '{}' already exists",
                new.username
            )));
        }
        let user = User {
            id: inner.next_id(),
            username: new.username,
            password: new.password,
            role: new.role,
            created_at: Some(Utc::now()),
        };
        inner.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, StoreError> {
        let mut inner = self.lock();
        if inner.assignments.iter().any(|a| a.part_id == new.part_id) {
            return Err(StoreError::Conflict(
                "Learning part already has an assignment".to_string(),
            ));
        }
        let assignment = Assignment {
            id: inner.next_id(),
            part_id: new.part_id,
            title: new.title,
            description: new.description,
            total_marks: new.total_marks,
            passing_marks: new.passing_marks,
            time_limit_minutes: new.time_limit_minutes,
            max_attempts: new.max_attempts,
            shuffle_questions: new.shuffle_questions,
            show_results_immediately: new.show_results_immediately,
            allow_review: new.allow_review,
            is_active: true,
            created_by: new.created_by,
            created_at: Some(Utc::now()),
        };
        inner.assignments.push(assignment.clone());
        Ok(assignment)
    }

    async fn update_assignment(
        &self,
        id: i64,
        patch: AssignmentPatch,
    ) -> Result<Assignment, StoreError> {
        let mut inner = self.lock();
        let assignment = inner
            .assignments
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        if let Some(title) = patch.title {
            assignment.title = title;
        }
        if let Some(description) = patch.description {
            assignment.description = Some(description);
        }
        if let Some(passing_marks) = patch.passing_marks {
            assignment.passing_marks = passing_marks;
        }
        if let Some(time_limit_minutes) = patch.time_limit_minutes {
            assignment.time_limit_minutes = time_limit_minutes;
        }
        if let Some(max_attempts) = patch.max_attempts {
            assignment.max_attempts = max_attempts;
        }
        if let Some(shuffle_questions) = patch.shuffle_questions {
            assignment.shuffle_questions = shuffle_questions;
        }
        if let Some(show_results_immediately) = patch.show_results_immediately {
            assignment.show_results_immediately = show_results_immediately;
        }
        if let Some(allow_review) = patch.allow_review {
            assignment.allow_review = allow_review;
        }
        if let Some(is_active) = patch.is_active {
            assignment.is_active = is_active;
        }
        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let before = inner.assignments.len();
        inner.assignments.retain(|a| a.id != id);
        if inner.assignments.len() == before {
            return Err(StoreError::NotFound);
        }
        inner.questions.retain(|q| q.assignment_id != id);
        inner.attempts.retain(|a| a.assignment_id != id);
        inner.submissions.retain(|s| s.assignment_id != id);
        inner.results.retain(|r| r.assignment_id != id);
        Ok(())
    }

    async fn find_assignment(&self, id: i64) -> Result<Option<Assignment>, StoreError> {
        Ok(self.lock().assignments.iter().find(|a| a.id == id).cloned())
    }

    async fn find_assignment_by_part(
        &self,
        part_id: i64,
    ) -> Result<Option<Assignment>, StoreError> {
        Ok(self
            .lock()
            .assignments
            .iter()
            .find(|a| a.part_id == part_id)
            .cloned())
    }

    async fn create_question(&self, new: NewQuestion) -> Result<Question, StoreError> {
        let mut inner = self.lock();
        let question = Question {
            id: inner.next_id(),
            assignment_id: new.assignment_id,
            question_text: new.question_text,
            question_type: new.question_type,
            option_a: new.option_a,
            option_b: new.option_b,
            option_c: new.option_c,
            option_d: new.option_d,
            option_e: new.option_e,
            correct_answers: new.correct_answers,
            marks: new.marks,
            explanation: new.explanation,
            question_order: new.question_order,
            is_active: true,
        };
        inner.questions.push(question.clone());
        Ok(question)
    }

    async fn update_question(&self, id: i64, new: NewQuestion) -> Result<Question, StoreError> {
        let mut inner = self.lock();
        let question = inner
            .questions
            .iter_mut()
            .find(|q| q.id == id)
            .ok_or(StoreError::NotFound)?;
        question.question_text = new.question_text;
        question.question_type = new.question_type;
        question.option_a = new.option_a;
        question.option_b = new.option_b;
        question.option_c = new.option_c;
        question.option_d = new.option_d;
        question.option_e = new.option_e;
        question.correct_answers = new.correct_answers;
        question.marks = new.marks;
        question.explanation = new.explanation;
        question.question_order = new.question_order;
        Ok(question.clone())
    }

    async fn delete_question(&self, id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let before = inner.questions.len();
        inner.questions.retain(|q| q.id != id);
        if inner.questions.len() == before {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn find_question(&self, id: i64) -> Result<Option<Question>, StoreError> {
        Ok(self.lock().questions.iter().find(|q| q.id == id).cloned())
    }

    async fn list_questions(&self, assignment_id: i64) -> Result<Vec<Question>, StoreError> {
        let mut questions: Vec<Question> = self
            .lock()
            .questions
            .iter()
            .filter(|q| q.assignment_id == assignment_id && q.is_active)
            .cloned()
            .collect();
        questions.sort_by_key(|q| (q.question_order, q.id));
        Ok(questions)
    }

    async fn create_attempt(&self, new: NewAttempt) -> Result<Attempt, StoreError> {
        let mut inner = self.lock();
        let active = inner.attempts.iter().any(|a| {
            a.assignment_id == new.assignment_id
                && a.student_id == new.student_id
                && a.status == AttemptStatus::InProgress
        });
        if active {
            return Err(StoreError::Conflict(
                "An attempt is already in progress".to_string(),
            ));
        }
        let attempt_number = inner
            .attempts
            .iter()
            .filter(|a| a.assignment_id == new.assignment_id && a.student_id == new.student_id)
            .map(|a| a.attempt_number)
            .max()
            .unwrap_or(0)
            + 1;
        let attempt = Attempt {
            id: inner.next_id(),
            assignment_id: new.assignment_id,
            student_id: new.student_id,
            attempt_number,
            status: AttemptStatus::InProgress,
            time_remaining_seconds: new.time_remaining_seconds,
            question_order: new.question_order,
            start_time: Utc::now(),
            end_time: None,
        };
        inner.attempts.push(attempt.clone());
        Ok(attempt)
    }

    async fn find_attempt(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        Ok(self.lock().attempts.iter().find(|a| a.id == id).cloned())
    }

    async fn find_active_attempt(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<Attempt>, StoreError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .find(|a| {
                a.assignment_id == assignment_id
                    && a.student_id == student_id
                    && a.status == AttemptStatus::InProgress
            })
            .cloned())
    }

    async fn count_active_attempts(&self, assignment_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .attempts
            .iter()
            .filter(|a| a.assignment_id == assignment_id && a.status == AttemptStatus::InProgress)
            .count() as i64)
    }

    async fn update_attempt_time(&self, id: i64, seconds: i32) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if let Some(attempt) = inner
            .attempts
            .iter_mut()
            .find(|a| a.id == id && a.status == AttemptStatus::InProgress)
        {
            attempt.time_remaining_seconds = seconds;
        }
        Ok(())
    }

    async fn complete_attempt(
        &self,
        id: i64,
        status: AttemptStatus,
        end_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut inner = self.lock();
        let attempt = inner
            .attempts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::NotFound)?;
        if attempt.status.is_terminal() {
            return Err(StoreError::Conflict(
                "Attempt is already finalized".to_string(),
            ));
        }
        attempt.status = status;
        attempt.end_time = Some(end_time);
        Ok(())
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, StoreError> {
        let mut inner = self.lock();
        let duplicate = inner.submissions.iter().any(|s| {
            s.assignment_id == new.assignment_id
                && s.student_id == new.student_id
                && s.attempt_number == new.attempt_number
        });
        if duplicate {
            return Err(StoreError::Conflict(
                "Attempt has already been submitted".to_string(),
            ));
        }
        let submission = Submission {
            id: inner.next_id(),
            assignment_id: new.assignment_id,
            student_id: new.student_id,
            attempt_number: new.attempt_number,
            answers: new.answers,
            score: new.score,
            total_marks: new.total_marks,
            percentage: new.percentage,
            time_taken_seconds: new.time_taken_seconds,
            review_data: Some(new.review_data),
            status: "submitted".to_string(),
            submitted_at: Utc::now(),
        };
        inner.submissions.push(submission.clone());
        Ok(submission)
    }

    async fn count_submissions(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<i64, StoreError> {
        Ok(self
            .lock()
            .submissions
            .iter()
            .filter(|s| {
                s.assignment_id == assignment_id
                    && s.student_id == student_id
                    && s.status == "submitted"
            })
            .count() as i64)
    }

    async fn find_submission(&self, id: i64) -> Result<Option<Submission>, StoreError> {
        Ok(self.lock().submissions.iter().find(|s| s.id == id).cloned())
    }

    async fn upsert_result(
        &self,
        assignment_id: i64,
        student_id: i64,
        score: i32,
        percentage: f64,
        passed: bool,
    ) -> Result<AssignmentResult, StoreError> {
        let mut inner = self.lock();
        if let Some(result) = inner
            .results
            .iter_mut()
            .find(|r| r.assignment_id == assignment_id && r.student_id == student_id)
        {
            result.best_score = result.best_score.max(score);
            result.best_percentage = result.best_percentage.max(percentage);
            result.attempts_used += 1;
            result.passed = result.passed || passed;
            result.last_attempt_at = Utc::now();
            return Ok(result.clone());
        }
        let result = AssignmentResult {
            id: inner.next_id(),
            assignment_id,
            student_id,
            best_score: score,
            best_percentage: percentage,
            attempts_used: 1,
            passed,
            last_attempt_at: Utc::now(),
        };
        inner.results.push(result.clone());
        Ok(result)
    }

    async fn find_result(
        &self,
        assignment_id: i64,
        student_id: i64,
    ) -> Result<Option<AssignmentResult>, StoreError> {
        Ok(self
            .lock()
            .results
            .iter()
            .find(|r| r.assignment_id == assignment_id && r.student_id == student_id)
            .cloned())
    }

    async fn mark_part_completed(&self, part_id: i64, student_id: i64) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.progress.contains(&(part_id, student_id)) {
            inner.progress.push((part_id, student_id));
        }
        Ok(())
    }
}
