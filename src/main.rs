mod quiz;
mod render;

use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use dotenv::dotenv;
use teloxide::{
    dispatching::dialogue::{serializer::Json, ErasedStorage, SqliteStorage, Storage},
    prelude::*,
    types::{ChatId, ParseMode},
};

use quiz::bank::{Catalogue, DifficultyMix};
use quiz::check::QuickCheck;
use quiz::Attempt;

type QuizDialogue = Dialogue<State, ErasedStorage<State>>;
type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub enum State {
    #[default]
    Start,
    ReceiveFullName,
    ReceiveMenuChoice,
    ReceiveCourseChoice,
    ReceiveTopicChoice {
        course: String,
    },
    ReceiveQuestionCount {
        course: String,
        topic: String,
    },
    TakingQuiz {
        attempt: Attempt,
        topic: String,
        current: usize,
        started: SystemTime,
    },
    ReviewAnswers {
        attempt: Attempt,
        topic: String,
        started: SystemTime,
    },
    ReceiveQuestionNumber {
        attempt: Attempt,
        topic: String,
        started: SystemTime,
    },
    ReceiveNewAnswer {
        attempt: Attempt,
        topic: String,
        index: usize,
        started: SystemTime,
    },
    ShowingResults {
        attempt: Attempt,
        topic: String,
    },
    TakingQuickCheck {
        check: QuickCheck,
        topic: String,
    },
    QuickCheckRevealed {
        check: QuickCheck,
        topic: String,
    },
}

type QuizStorage = std::sync::Arc<ErasedStorage<State>>;

#[tokio::main]
async fn main() {
    dotenv().expect("Failed to load .env file");

    pretty_env_logger::init();
    log::info!("Starting quiz bot...");

    let bot = Bot::from_env();

    println!("Establishing connection to the database...");
    let db_path = std::env::var("QUIZ_DB").unwrap_or_else(|_| "quiz.sqlite".to_string());
    let storage: QuizStorage = SqliteStorage::open(&db_path, Json)
        .await
        .expect("Failed to open the dialogue database")
        .erase();
    println!("Connection established");

    println!("Loading the question banks");
    let data_dir = std::env::var("QUIZ_DATA_DIR").unwrap_or_else(|_| "data".to_string());
    let catalogue = Arc::new(
        Catalogue::load_dir(Path::new(&data_dir)).expect("Failed to load question banks"),
    );
    println!("Question banks loaded");

    let catalogue_for_menu = catalogue.clone();
    let catalogue_for_courses = catalogue.clone();
    let catalogue_for_topics = catalogue.clone();
    let catalogue_for_count = catalogue.clone();
    let catalogue_for_results = catalogue.clone();
    let catalogue_for_revealed = catalogue.clone();

    Dispatcher::builder(
        bot,
        Update::filter_message()
            .enter_dialogue::<Message, ErasedStorage<State>, State>()
            .branch(dptree::case![State::Start].endpoint(start))
            .branch(dptree::case![State::ReceiveFullName].endpoint(receive_full_name))
            .branch(dptree::case![State::ReceiveMenuChoice].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    receive_menu_choice(catalogue_for_menu.clone(), bot, dialogue, msg)
                },
            ))
            .branch(dptree::case![State::ReceiveCourseChoice].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, msg: Message| {
                    receive_course_choice(catalogue_for_courses.clone(), bot, dialogue, msg)
                },
            ))
            .branch(dptree::case![State::ReceiveTopicChoice { course }].endpoint(
                move |bot: Bot, dialogue: QuizDialogue, course: String, msg: Message| {
                    receive_topic_choice(catalogue_for_topics.clone(), bot, dialogue, course, msg)
                },
            ))
            .branch(
                dptree::case![State::ReceiveQuestionCount { course, topic }].endpoint(
                    move |bot: Bot,
                          dialogue: QuizDialogue,
                          (course, topic): (String, String),
                          msg: Message| {
                        receive_question_count(
                            catalogue_for_count.clone(),
                            bot,
                            dialogue,
                            (course, topic),
                            msg,
                        )
                    },
                ),
            )
            .branch(
                dptree::case![State::TakingQuiz {
                    attempt,
                    topic,
                    current,
                    started
                }]
                .endpoint(taking_quiz),
            )
            .branch(
                dptree::case![State::ReviewAnswers {
                    attempt,
                    topic,
                    started
                }]
                .endpoint(review_answers),
            )
            .branch(
                dptree::case![State::ReceiveQuestionNumber {
                    attempt,
                    topic,
                    started
                }]
                .endpoint(receive_question_number),
            )
            .branch(
                dptree::case![State::ReceiveNewAnswer {
                    attempt,
                    topic,
                    index,
                    started
                }]
                .endpoint(receive_new_answer),
            )
            .branch(dptree::case![State::ShowingResults { attempt, topic }].endpoint(
                move |bot: Bot,
                      dialogue: QuizDialogue,
                      (attempt, topic): (Attempt, String),
                      msg: Message| {
                    showing_results(
                        catalogue_for_results.clone(),
                        bot,
                        dialogue,
                        (attempt, topic),
                        msg,
                    )
                },
            ))
            .branch(
                dptree::case![State::TakingQuickCheck { check, topic }]
                    .endpoint(taking_quick_check),
            )
            .branch(dptree::case![State::QuickCheckRevealed { check, topic }].endpoint(
                move |bot: Bot,
                      dialogue: QuizDialogue,
                      (check, topic): (QuickCheck, String),
                      msg: Message| {
                    quick_check_revealed(
                        catalogue_for_revealed.clone(),
                        bot,
                        dialogue,
                        (check, topic),
                        msg,
                    )
                },
            )),
    )
    .dependencies(dptree::deps![storage])
    .enable_ctrlc_handler()
    .build()
    .dispatch()
    .await;
}

async fn send_main_menu(bot: &Bot, chat: ChatId) -> HandlerResult {
    bot.send_message(chat, "What would you like to do?")
        .reply_markup(render::main_menu_keyboard())
        .await?;
    Ok(())
}

async fn send_courses(catalogue: &Catalogue, bot: &Bot, chat: ChatId) -> HandlerResult {
    let courses = catalogue.courses();
    bot.send_message(chat, "Which course are you revising?")
        .reply_markup(render::courses_keyboard(&courses))
        .await?;
    Ok(())
}

async fn send_question(bot: &Bot, chat: ChatId, attempt: &Attempt, index: usize) -> HandlerResult {
    let question = match attempt.question(index) {
        Some(question) => question,
        None => return Ok(()),
    };
    bot.send_message(
        chat,
        render::question_message(index + 1, attempt.len(), question),
    )
    .parse_mode(ParseMode::Html)
    .reply_markup(render::options_keyboard(question, &[render::SKIP_QUESTION]))
    .await?;
    Ok(())
}

async fn send_summary(bot: &Bot, chat: ChatId, attempt: &Attempt) -> HandlerResult {
    bot.send_message(chat, render::summary_message(attempt))
        .reply_markup(render::summary_keyboard())
        .await?;
    Ok(())
}

async fn start_quick_check(
    catalogue: &Catalogue,
    bot: &Bot,
    dialogue: &QuizDialogue,
    chat: ChatId,
) -> HandlerResult {
    let (bank, question) = match catalogue.random_question() {
        Some(draw) => draw,
        None => {
            bot.send_message(chat, "There are no questions loaded yet")
                .await?;
            return Ok(());
        }
    };

    bot.send_message(chat, render::quick_check_message(&bank.title, question))
        .parse_mode(ParseMode::Html)
        .reply_markup(render::options_keyboard(question, &[render::MAIN_MENU]))
        .await?;

    dialogue
        .update(State::TakingQuickCheck {
            check: QuickCheck::new(question.clone()),
            topic: bank.title.clone(),
        })
        .await?;
    Ok(())
}

const GREETING_TEXT: &str = "Hi! I'm the Sparks revision bot. I'll help you revise for your electrical qualifications! Let's get introduced. What's your name?";
async fn start(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    bot.send_message(msg.chat.id, GREETING_TEXT).await?;

    dialogue.update(State::ReceiveFullName).await?;
    Ok(())
}

async fn receive_full_name(bot: Bot, dialogue: QuizDialogue, msg: Message) -> HandlerResult {
    match msg.text() {
        Some(full_name) => {
            bot.send_message(msg.chat.id, format!("Nice to meet you, {}!", full_name))
                .await?;
        }
        None => {
            bot.send_message(msg.chat.id, "Please type your name").await?;
            return Ok(());
        }
    }

    send_main_menu(&bot, msg.chat.id).await?;
    dialogue.update(State::ReceiveMenuChoice).await?;
    Ok(())
}

async fn receive_menu_choice(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(render::BROWSE_COURSES) => {
            send_courses(&catalogue, &bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveCourseChoice).await?;
        }
        Some(render::QUICK_CHECK) => {
            start_quick_check(&catalogue, &bot, &dialogue, msg.chat.id).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .await?;
        }
    }
    Ok(())
}

async fn receive_course_choice(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(msg.chat.id, "Please pick one of the courses")
                .await?;
            return Ok(());
        }
    };

    if text == render::MAIN_MENU {
        send_main_menu(&bot, msg.chat.id).await?;
        dialogue.update(State::ReceiveMenuChoice).await?;
        return Ok(());
    }

    let banks = catalogue.banks_for_course(text);
    if banks.is_empty() {
        bot.send_message(msg.chat.id, "Please pick one of the courses")
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "Pick a topic")
        .reply_markup(render::topics_keyboard(&banks))
        .await?;
    dialogue
        .update(State::ReceiveTopicChoice {
            course: text.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_topic_choice(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    course: String,
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(msg.chat.id, "Please pick one of the topics")
                .await?;
            return Ok(());
        }
    };

    if text == render::MAIN_MENU {
        send_main_menu(&bot, msg.chat.id).await?;
        dialogue.update(State::ReceiveMenuChoice).await?;
        return Ok(());
    }

    if catalogue.bank_by_title(&course, text).is_none() {
        bot.send_message(msg.chat.id, "Please pick one of the topics")
            .await?;
        return Ok(());
    }

    bot.send_message(msg.chat.id, "How many questions would you like?")
        .reply_markup(render::count_keyboard())
        .await?;
    dialogue
        .update(State::ReceiveQuestionCount {
            course,
            topic: text.to_string(),
        })
        .await?;
    Ok(())
}

async fn receive_question_count(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    (course, topic): (String, String),
    msg: Message,
) -> HandlerResult {
    let amount: usize = match msg.text().and_then(|text| text.trim().parse().ok()) {
        Some(amount) => amount,
        None => {
            bot.send_message(msg.chat.id, "Please enter a number").await?;
            return Ok(());
        }
    };
    if amount == 0 {
        bot.send_message(msg.chat.id, "The number of questions cannot be 0")
            .await?;
        return Ok(());
    }

    let bank = match catalogue.bank_by_title(&course, &topic) {
        Some(bank) => bank,
        None => {
            send_main_menu(&bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveMenuChoice).await?;
            return Ok(());
        }
    };

    let paper = if bank.has_difficulty_tiers() {
        bank.sample_weighted(amount, &DifficultyMix::default())
    } else {
        bank.sample(amount)
    };
    if paper.is_empty() {
        bot.send_message(msg.chat.id, "That topic has no questions yet")
            .reply_markup(render::main_menu_keyboard())
            .await?;
        dialogue.update(State::ReceiveMenuChoice).await?;
        return Ok(());
    }

    let attempt = Attempt::new(paper);
    bot.send_message(
        msg.chat.id,
        format!(
            "Great! {} questions from {}. Answer with the letters, skip anything you are unsure of, and change your mind as often as you like before you submit.",
            attempt.len(),
            topic
        ),
    )
    .await?;
    send_question(&bot, msg.chat.id, &attempt, 0).await?;

    dialogue
        .update(State::TakingQuiz {
            attempt,
            topic,
            current: 0,
            started: SystemTime::now(),
        })
        .await?;
    Ok(())
}

async fn taking_quiz(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut attempt, topic, current, started): (Attempt, String, usize, SystemTime),
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(msg.chat.id, "Pick one of the lettered answers, or Skip")
                .await?;
            return Ok(());
        }
    };

    let question = match attempt.question(current) {
        Some(question) => question.clone(),
        None => {
            send_main_menu(&bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveMenuChoice).await?;
            return Ok(());
        }
    };

    if text != render::SKIP_QUESTION {
        match render::parse_option_letter(text, question.options.len()) {
            Some(option) => {
                attempt.select(question.id, option);
                log::debug!(
                    "chat {}: question {} answered with option {}",
                    msg.chat.id,
                    question.id,
                    option
                );
            }
            None => {
                bot.send_message(msg.chat.id, "Pick one of the lettered answers, or Skip")
                    .await?;
                return Ok(());
            }
        }
    }

    let next = current + 1;
    if next < attempt.len() {
        send_question(&bot, msg.chat.id, &attempt, next).await?;
        dialogue
            .update(State::TakingQuiz {
                attempt,
                topic,
                current: next,
                started,
            })
            .await?;
    } else {
        send_summary(&bot, msg.chat.id, &attempt).await?;
        dialogue
            .update(State::ReviewAnswers {
                attempt,
                topic,
                started,
            })
            .await?;
    }
    Ok(())
}

async fn review_answers(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut attempt, topic, started): (Attempt, String, SystemTime),
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(render::SUBMIT_ANSWERS) => {
            let score = attempt.submit();
            log::debug!(
                "chat {}: submitted {} with {}/{}",
                msg.chat.id,
                topic,
                score.correct,
                score.total
            );
            let elapsed = started.elapsed().unwrap_or_default();
            bot.send_message(
                msg.chat.id,
                render::results_message(&attempt, &topic, elapsed),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(render::results_keyboard())
            .await?;
            for message in render::breakdown_messages(&attempt) {
                bot.send_message(msg.chat.id, message)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
            dialogue
                .update(State::ShowingResults { attempt, topic })
                .await?;
        }
        Some(render::CHANGE_ANSWER) => {
            bot.send_message(msg.chat.id, "Which question do you want to change?")
                .reply_markup(render::question_number_keyboard(attempt.len()))
                .await?;
            dialogue
                .update(State::ReceiveQuestionNumber {
                    attempt,
                    topic,
                    started,
                })
                .await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .await?;
        }
    }
    Ok(())
}

async fn receive_question_number(
    bot: Bot,
    dialogue: QuizDialogue,
    (attempt, topic, started): (Attempt, String, SystemTime),
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(
                msg.chat.id,
                format!("Give a question number between 1 and {}", attempt.len()),
            )
            .await?;
            return Ok(());
        }
    };

    if text == render::BACK_TO_SUMMARY {
        send_summary(&bot, msg.chat.id, &attempt).await?;
        dialogue
            .update(State::ReviewAnswers {
                attempt,
                topic,
                started,
            })
            .await?;
        return Ok(());
    }

    let number: usize = match text.trim().parse() {
        Ok(number) if (1..=attempt.len()).contains(&number) => number,
        _ => {
            bot.send_message(
                msg.chat.id,
                format!("Give a question number between 1 and {}", attempt.len()),
            )
            .await?;
            return Ok(());
        }
    };
    let index = number - 1;

    if let Some(question) = attempt.question(index) {
        let current_answer = match attempt.selection(question.id) {
            Some(picked) => format!("Your current answer is {}", render::option_letter(picked)),
            None => "You have not answered this one yet".to_string(),
        };
        let mut message = render::question_message(number, attempt.len(), question);
        message.push('\n');
        message.push_str(&current_answer);
        bot.send_message(msg.chat.id, message)
            .parse_mode(ParseMode::Html)
            .reply_markup(render::options_keyboard(question, &[render::KEEP_ANSWER]))
            .await?;
    }

    dialogue
        .update(State::ReceiveNewAnswer {
            attempt,
            topic,
            index,
            started,
        })
        .await?;
    Ok(())
}

async fn receive_new_answer(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut attempt, topic, index, started): (Attempt, String, usize, SystemTime),
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(
                msg.chat.id,
                "Pick one of the lettered answers, or keep it as it is",
            )
            .await?;
            return Ok(());
        }
    };

    if text != render::KEEP_ANSWER {
        let question = match attempt.question(index) {
            Some(question) => question.clone(),
            None => {
                send_summary(&bot, msg.chat.id, &attempt).await?;
                dialogue
                    .update(State::ReviewAnswers {
                        attempt,
                        topic,
                        started,
                    })
                    .await?;
                return Ok(());
            }
        };
        match render::parse_option_letter(text, question.options.len()) {
            Some(option) => {
                attempt.select(question.id, option);
                log::debug!(
                    "chat {}: question {} changed to option {}",
                    msg.chat.id,
                    question.id,
                    option
                );
            }
            None => {
                bot.send_message(
                    msg.chat.id,
                    "Pick one of the lettered answers, or keep it as it is",
                )
                .await?;
                return Ok(());
            }
        }
    }

    send_summary(&bot, msg.chat.id, &attempt).await?;
    dialogue
        .update(State::ReviewAnswers {
            attempt,
            topic,
            started,
        })
        .await?;
    Ok(())
}

async fn showing_results(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    (mut attempt, topic): (Attempt, String),
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(render::REVIEW_MISTAKES) => {
            for message in render::mistakes_messages(&attempt) {
                bot.send_message(msg.chat.id, message)
                    .parse_mode(ParseMode::Html)
                    .await?;
            }
        }
        Some(render::RETAKE_QUIZ) => {
            attempt.reset();
            bot.send_message(msg.chat.id, "Same questions, clean sheet. Good luck!")
                .await?;
            send_question(&bot, msg.chat.id, &attempt, 0).await?;
            dialogue
                .update(State::TakingQuiz {
                    attempt,
                    topic,
                    current: 0,
                    started: SystemTime::now(),
                })
                .await?;
        }
        Some(render::NEW_TOPIC) => {
            send_courses(&catalogue, &bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveCourseChoice).await?;
        }
        Some(render::MAIN_MENU) => {
            send_main_menu(&bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveMenuChoice).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .await?;
        }
    }
    Ok(())
}

async fn taking_quick_check(
    bot: Bot,
    dialogue: QuizDialogue,
    (mut check, topic): (QuickCheck, String),
    msg: Message,
) -> HandlerResult {
    let text = match msg.text() {
        Some(text) => text,
        None => {
            bot.send_message(msg.chat.id, "Pick one of the lettered answers")
                .await?;
            return Ok(());
        }
    };

    if text == render::MAIN_MENU {
        send_main_menu(&bot, msg.chat.id).await?;
        dialogue.update(State::ReceiveMenuChoice).await?;
        return Ok(());
    }

    let option = match render::parse_option_letter(text, check.question().options.len()) {
        Some(option) => option,
        None => {
            bot.send_message(msg.chat.id, "Pick one of the lettered answers")
                .await?;
            return Ok(());
        }
    };
    check.select(option);

    bot.send_message(msg.chat.id, render::reveal_message(&check))
        .parse_mode(ParseMode::Html)
        .reply_markup(render::reveal_keyboard())
        .await?;
    dialogue
        .update(State::QuickCheckRevealed { check, topic })
        .await?;
    Ok(())
}

async fn quick_check_revealed(
    catalogue: Arc<Catalogue>,
    bot: Bot,
    dialogue: QuizDialogue,
    (mut check, topic): (QuickCheck, String),
    msg: Message,
) -> HandlerResult {
    match msg.text() {
        Some(render::TRY_AGAIN) => {
            check.reset();
            bot.send_message(
                msg.chat.id,
                render::quick_check_message(&topic, check.question()),
            )
            .parse_mode(ParseMode::Html)
            .reply_markup(render::options_keyboard(
                check.question(),
                &[render::MAIN_MENU],
            ))
            .await?;
            dialogue
                .update(State::TakingQuickCheck { check, topic })
                .await?;
        }
        Some(render::ANOTHER_CHECK) => {
            start_quick_check(&catalogue, &bot, &dialogue, msg.chat.id).await?;
        }
        Some(render::MAIN_MENU) => {
            send_main_menu(&bot, msg.chat.id).await?;
            dialogue.update(State::ReceiveMenuChoice).await?;
        }
        _ => {
            bot.send_message(msg.chat.id, "Please pick one of the options")
                .await?;
        }
    }
    Ok(())
}
