use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write as _;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use quizthon_api::client::{ApiClient, ClientError, FileTokenStore, LoginForm, SignupForm};
use quizthon_api::config::ClientConfig;
use quizthon_api::models::trivia::CATEGORIES;
use quizthon_api::models::HistoryStats;
use quizthon_api::quiz::{
    ControllerPhase, ControllerSettings, NextStep, OpenTdbClient, OptionOutcome,
    PresentedQuestion, QuizController, QuizSummary, Reveal, TickOutcome,
};
use quizthon_api::telemetry::init_tracing;

type StdinLines = Lines<BufReader<Stdin>>;

#[derive(Parser)]
#[clap(author, version, about = "Timed trivia quizzes in the terminal", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a quiz
    Play {
        /// easy, medium or hard
        #[clap(short, long)]
        difficulty: Option<String>,
        /// Category id, see `categories`
        #[clap(short, long)]
        category: Option<String>,
        /// Play without signing in; results are not saved
        #[clap(long)]
        guest: bool,
    },
    /// Sign in with email and password
    Login { email: String },
    /// Create an account
    Signup { name: String, email: String },
    /// Sign in with a Google ID token
    Google { credential: String },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user's quiz history
    History,
    /// List trivia categories
    Categories,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _telemetry = init_tracing("quizthon", "quizthon_api=warn");
    let cli = Cli::parse();
    let config = ClientConfig::load().context("Failed to load client configuration")?;

    let api = ApiClient::new(
        config.server_base.clone(),
        Arc::new(FileTokenStore::new(config.token_path.clone())),
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match cli.command {
        Commands::Categories => {
            for (id, name) in CATEGORIES {
                println!("{:>3}  {}", id, name);
            }
        }
        Commands::Login { email } => {
            let password = prompt(&mut lines, "Password: ").await?;
            report(api.login(&LoginForm::new(&email, &password)).await);
        }
        Commands::Signup { name, email } => {
            let password = prompt(&mut lines, "Password: ").await?;
            report(api.signup(&SignupForm::new(&name, &email, &password)).await);
        }
        Commands::Google { credential } => report(api.google_login(&credential).await),
        Commands::Logout => {
            api.logout()?;
            println!("Signed out.");
        }
        Commands::History => show_history(&api).await?,
        Commands::Play {
            difficulty,
            category,
            guest,
        } => {
            let api = if guest || !config.auth_enabled {
                None
            } else {
                restore(&api).await
            };
            let difficulty = match difficulty {
                Some(d) => d,
                None => prompt(&mut lines, "Difficulty (easy/medium/hard): ").await?,
            };
            let category = match category {
                Some(c) => c,
                None => prompt(&mut lines, "Category id (see `quizthon categories`): ").await?,
            };
            play(&config, api, &difficulty, &category, &mut lines).await?;
        }
    }

    Ok(())
}

async fn prompt(lines: &mut StdinLines, label: &str) -> anyhow::Result<String> {
    print!("{}", label);
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?.unwrap_or_default().trim().to_string())
}

fn report(outcome: Result<quizthon_api::models::UserProfile, ClientError>) {
    match outcome {
        Ok(user) => println!("Welcome, {}!", user.name),
        Err(ClientError::Validation(errors)) => {
            for error in errors.0 {
                eprintln!("{}: {}", error.field, error.message);
            }
        }
        Err(e) => eprintln!("{}", e),
    }
}

async fn restore(api: &ApiClient) -> Option<ApiClient> {
    match api.restore_session().await {
        Ok(Some(user)) => {
            println!("Signed in as {}.", user.name);
            Some(api.clone())
        }
        Ok(None) => {
            println!("Playing as guest; run `quizthon login` to save results.");
            None
        }
        Err(e) => {
            eprintln!("Could not restore session ({}); playing as guest.", e);
            None
        }
    }
}

async fn play(
    config: &ClientConfig,
    api: Option<ApiClient>,
    difficulty: &str,
    category: &str,
    lines: &mut StdinLines,
) -> anyhow::Result<()> {
    let trivia = Arc::new(OpenTdbClient::new(config.trivia_base.clone()));
    let settings = ControllerSettings {
        question_count: config.question_count,
        ..ControllerSettings::default()
    };
    let (mut controller, mut ticks) = QuizController::new(trivia, settings);
    if let Some(api) = &api {
        controller.attach_results(Arc::new(api.clone()));
    }

    println!("Loading questions...");
    match controller.start_session(difficulty, category).await {
        Ok(presented) => show_question(&presented),
        Err(e) => {
            eprintln!("{}", e);
            return Ok(());
        }
    }

    loop {
        tokio::select! {
            Some(tick) = ticks.recv() => match controller.handle_tick(tick) {
                TickOutcome::Running { remaining_seconds } => {
                    if remaining_seconds <= 5 || remaining_seconds % 5 == 0 {
                        println!("  ⏱  {}s left", remaining_seconds);
                    }
                }
                TickOutcome::Expired(reveal) => show_reveal(&reveal),
                TickOutcome::Ignored => {}
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    controller.abort();
                    break;
                };
                let input = line.trim();
                if input.eq_ignore_ascii_case("q") {
                    controller.abort();
                    println!("Quiz abandoned.");
                    break;
                }

                match controller.phase().clone() {
                    ControllerPhase::AwaitingAnswer => {
                        let options = controller
                            .session()
                            .map(|s| s.presented_options().to_vec())
                            .unwrap_or_default();
                        let choice = input
                            .parse::<usize>()
                            .ok()
                            .and_then(|n| n.checked_sub(1))
                            .and_then(|i| options.get(i));
                        match choice {
                            Some(option) => {
                                if let Some(reveal) = controller.submit_answer(option) {
                                    show_reveal(&reveal);
                                }
                            }
                            None => println!("Pick 1-{}, or q to quit.", options.len()),
                        }
                    }
                    ControllerPhase::Revealed => {
                        if input.eq_ignore_ascii_case("r") {
                            match controller.restart().await {
                                Ok(presented) => show_question(&presented),
                                Err(e) => {
                                    eprintln!("{}", e);
                                    break;
                                }
                            }
                            continue;
                        }
                        match controller.next_question() {
                            Some(NextStep::Question(presented)) => show_question(&presented),
                            Some(NextStep::Finished(summary)) => {
                                show_summary(&summary);
                                break;
                            }
                            None => {}
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    if let Some(save) = controller.take_pending_save() {
        if save.await.is_ok() {
            if let Some(user) = api.and_then(|a| a.current_user()) {
                let stats = HistoryStats::from_history(&user.quiz_history);
                println!(
                    "{} quizzes played, average {}%, best {}%.",
                    stats.total_quizzes, stats.average_percentage, stats.best_percentage
                );
            }
        }
    }

    Ok(())
}

fn show_question(presented: &PresentedQuestion) {
    println!();
    println!(
        "Question {} of {}  [{}%]  {}s",
        presented.index + 1,
        presented.total,
        presented.progress_percent(),
        presented.time_limit_seconds
    );
    println!("{}", presented.prompt);
    for (i, option) in presented.options.iter().enumerate() {
        println!("  {}. {}", i + 1, option);
    }
}

fn show_reveal(reveal: &Reveal) {
    for (i, (option, outcome)) in reveal.options.iter().enumerate() {
        let mark = match outcome {
            OptionOutcome::Correct => "✔",
            OptionOutcome::Incorrect => "✘",
            OptionOutcome::Neutral => " ",
        };
        println!("  {} {}. {}", mark, i + 1, option);
    }
    println!("{}", reveal.message());
    println!("Enter for the next question, r to restart, q to quit.");
}

fn show_summary(summary: &QuizSummary) {
    println!();
    println!("Quiz complete: {} ({}%)", summary.score_line(), summary.percentage);
    println!("{}", summary.tier);
    println!("{} / {}", summary.category.name, summary.difficulty);
}

async fn show_history(api: &ApiClient) -> anyhow::Result<()> {
    if api.restore_session().await?.is_none() {
        println!("Not signed in.");
        return Ok(());
    }

    let history = api.history().await?;
    if history.is_empty() {
        println!("No quizzes played yet.");
        return Ok(());
    }

    let stats = HistoryStats::from_history(&history);
    println!(
        "{} quizzes, average {}%, best {}%",
        stats.total_quizzes, stats.average_percentage, stats.best_percentage
    );
    for result in &history {
        println!(
            "{}  {:<40} {:<6} {:>2}/{:<2} {:>3}%",
            result.date.format("%Y-%m-%d %H:%M"),
            result.category,
            result.difficulty,
            result.score,
            result.total_questions,
            result.percentage
        );
    }
    Ok(())
}
