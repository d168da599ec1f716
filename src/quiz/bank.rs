use rand::seq::SliceRandom;
use rand::thread_rng;
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::{Difficulty, Question};

#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("could not read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not parse {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no question banks found under {}", .0.display())]
    EmptyCatalogue(PathBuf),
}

/// Relative weight of each difficulty tier in a sampled paper. Shares are
/// scaled by the weights' total, so the fields do not have to add up to
/// 100; advanced takes whatever the rounding leaves over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DifficultyMix {
    pub basic: u32,
    pub intermediate: u32,
    pub advanced: u32,
}

impl Default for DifficultyMix {
    fn default() -> Self {
        Self {
            basic: 40,
            intermediate: 45,
            advanced: 15,
        }
    }
}

/// One topic's worth of authored questions, loaded from a JSON file.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QuestionBank {
    pub slug: String,
    pub course: String,
    pub title: String,
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn load(path: &Path) -> Result<Self, BankError> {
        let file = File::open(path).map_err(|source| BankError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let bank: QuestionBank =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| BankError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        bank.log_authoring_defects();
        Ok(bank)
    }

    // Defective entries are kept (they still render and count towards the
    // total), but the author should hear about them at startup.
    fn log_authoring_defects(&self) {
        if self.questions.is_empty() {
            log::warn!("bank '{}' has no questions", self.slug);
        }
        let mut seen = BTreeSet::new();
        for question in &self.questions {
            if !seen.insert(question.id) {
                log::warn!("bank '{}' reuses question id {}", self.slug, question.id);
            }
            if !question.is_scoreable() {
                log::warn!(
                    "bank '{}' question {} marks option {} as correct but only has {} options",
                    self.slug,
                    question.id,
                    question.correct_index,
                    question.options.len()
                );
            }
        }
    }

    pub fn has_difficulty_tiers(&self) -> bool {
        self.questions
            .iter()
            .any(|question| question.difficulty.is_some())
    }

    /// A fresh paper of up to `count` questions in random order.
    pub fn sample(&self, count: usize) -> Vec<Question> {
        let mut paper = self.questions.clone();
        paper.shuffle(&mut thread_rng());
        paper.truncate(count);
        paper
    }

    /// A fresh paper weighted across difficulty tiers. The basic and
    /// intermediate shares are rounded to the nearest question and advanced
    /// takes the remainder; any tier too small to fill its share is topped
    /// up from questions not yet drawn.
    pub fn sample_weighted(&self, count: usize, mix: &DifficultyMix) -> Vec<Question> {
        let mut rng = thread_rng();
        let total = (mix.basic + mix.intermediate + mix.advanced).max(1);
        let share = |weight: u32| (count as f64 * weight as f64 / total as f64).round() as usize;
        let basic = share(mix.basic);
        let intermediate = share(mix.intermediate);
        let advanced = count.saturating_sub(basic + intermediate);

        let mut paper: Vec<Question> = Vec::new();
        for (tier, want) in [
            (Difficulty::Basic, basic),
            (Difficulty::Intermediate, intermediate),
            (Difficulty::Advanced, advanced),
        ] {
            let mut pool: Vec<Question> = self
                .questions
                .iter()
                .filter(|question| question.difficulty == Some(tier))
                .cloned()
                .collect();
            pool.shuffle(&mut rng);
            pool.truncate(want);
            paper.append(&mut pool);
        }

        if paper.len() < count {
            let drawn: BTreeSet<u32> = paper.iter().map(|question| question.id).collect();
            let mut spare: Vec<Question> = self
                .questions
                .iter()
                .filter(|question| !drawn.contains(&question.id))
                .cloned()
                .collect();
            spare.shuffle(&mut rng);
            spare.truncate(count - paper.len());
            paper.append(&mut spare);
        }

        paper.shuffle(&mut rng);
        paper.truncate(count);
        paper
    }
}

/// Every bank on disk, sorted by course and title so menus come out in a
/// stable order.
#[derive(Debug, Clone, Default)]
pub struct Catalogue {
    banks: Vec<QuestionBank>,
}

impl Catalogue {
    pub fn from_banks(mut banks: Vec<QuestionBank>) -> Self {
        banks.sort_by(|a, b| {
            (a.course.as_str(), a.title.as_str()).cmp(&(b.course.as_str(), b.title.as_str()))
        });
        Self { banks }
    }

    pub fn load_dir(dir: &Path) -> Result<Self, BankError> {
        let entries = fs::read_dir(dir).map_err(|source| BankError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut banks = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| BankError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            banks.push(QuestionBank::load(&path)?);
        }
        if banks.is_empty() {
            return Err(BankError::EmptyCatalogue(dir.to_path_buf()));
        }

        let catalogue = Self::from_banks(banks);
        log::info!(
            "loaded {} question banks ({} questions) from {}",
            catalogue.bank_count(),
            catalogue.question_count(),
            dir.display()
        );
        Ok(catalogue)
    }

    pub fn bank_count(&self) -> usize {
        self.banks.len()
    }

    pub fn question_count(&self) -> usize {
        self.banks.iter().map(|bank| bank.questions.len()).sum()
    }

    pub fn courses(&self) -> Vec<&str> {
        let mut courses: Vec<&str> = Vec::new();
        for bank in &self.banks {
            if !courses.contains(&bank.course.as_str()) {
                courses.push(bank.course.as_str());
            }
        }
        courses
    }

    pub fn banks_for_course(&self, course: &str) -> Vec<&QuestionBank> {
        self.banks
            .iter()
            .filter(|bank| bank.course == course)
            .collect()
    }

    pub fn bank_by_title(&self, course: &str, title: &str) -> Option<&QuestionBank> {
        self.banks
            .iter()
            .find(|bank| bank.course == course && bank.title == title)
    }

    pub fn random_question(&self) -> Option<(&QuestionBank, &Question)> {
        let pool: Vec<(&QuestionBank, &Question)> = self
            .banks
            .iter()
            .flat_map(|bank| bank.questions.iter().map(move |question| (bank, question)))
            .collect();
        pool.choose(&mut thread_rng()).copied()
    }
}
