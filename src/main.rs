use clap::{Parser, Subcommand};
use std::path::PathBuf;
use study_assistant::Result;
use study_assistant::commands::{
    App, GenerateQuizArgs, add_course, add_topic, add_user, ask, generate_quiz, ingest_file,
    reindex_document, resolve_base_dir, show_status, start_attempt, start_session, submit_attempt,
};
use study_assistant::config::{run_interactive_config, show_config};
use study_assistant::database::sqlite::models::QuestionType;
use study_assistant::quiz::DEFAULT_QUESTION_COUNT;

#[derive(Parser)]
#[command(name = "study-assistant")]
#[command(about = "Grounded study chat and quiz grading over your course documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and study.db (default: ~/.study-assistant)
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and retrieval/grading settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Create a user
    User { name: String, email: String },
    /// Create a course owned by a user
    Course {
        user_id: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Create a topic within a course
    Topic {
        course_id: i64,
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Add a text document to a course and index it
    Ingest {
        course_id: i64,
        file: PathBuf,
        #[arg(long)]
        title: Option<String>,
    },
    /// Re-chunk and re-embed an existing document
    Reindex { document_id: i64 },
    /// Open a chat session, optionally bound to a document
    Session {
        user_id: i64,
        #[arg(long)]
        course: Option<i64>,
        #[arg(long)]
        document: Option<i64>,
        #[arg(long)]
        title: Option<String>,
    },
    /// Ask a question in a chat session
    Ask { session_id: i64, question: String },
    /// Generate a quiz from a document or topic
    GenerateQuiz {
        course_id: i64,
        user_id: i64,
        title: String,
        #[arg(long)]
        document: Option<i64>,
        #[arg(long)]
        topic: Option<i64>,
        #[arg(long, default_value_t = DEFAULT_QUESTION_COUNT)]
        count: u32,
        /// multiple_choice, short_answer or essay
        #[arg(long = "type", default_value = "multiple_choice")]
        question_type: QuestionType,
    },
    /// Start a quiz attempt
    StartAttempt { quiz_id: i64, user_id: i64 },
    /// Submit answers for an attempt: a JSON array, inline or as a file path
    Submit { attempt_id: i64, answers: String },
    /// Show a user's courses, documents and quiz attempts
    Status { user_id: i64 },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let base_dir = resolve_base_dir(cli.base_dir)?;

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&base_dir)?;
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let app = App::open(&base_dir).await?;

    match cli.command {
        Commands::Config { .. } => {}
        Commands::User { name, email } => {
            add_user(&app, name, email).await?;
        }
        Commands::Course {
            user_id,
            title,
            description,
        } => {
            add_course(&app, user_id, title, description).await?;
        }
        Commands::Topic {
            course_id,
            name,
            description,
        } => {
            add_topic(&app, course_id, name, description).await?;
        }
        Commands::Ingest {
            course_id,
            file,
            title,
        } => {
            ingest_file(&app, course_id, &file, title).await?;
        }
        Commands::Reindex { document_id } => {
            reindex_document(&app, document_id).await?;
        }
        Commands::Session {
            user_id,
            course,
            document,
            title,
        } => {
            start_session(&app, user_id, course, document, title).await?;
        }
        Commands::Ask {
            session_id,
            question,
        } => {
            ask(&app, session_id, &question).await?;
        }
        Commands::GenerateQuiz {
            course_id,
            user_id,
            title,
            document,
            topic,
            count,
            question_type,
        } => {
            generate_quiz(
                &app,
                GenerateQuizArgs {
                    course_id,
                    user_id,
                    title,
                    document_id: document,
                    topic_id: topic,
                    count,
                    question_type,
                },
            )
            .await?;
        }
        Commands::StartAttempt { quiz_id, user_id } => {
            start_attempt(&app, quiz_id, user_id).await?;
        }
        Commands::Submit {
            attempt_id,
            answers,
        } => {
            submit_attempt(&app, attempt_id, &answers).await?;
        }
        Commands::Status { user_id } => {
            show_status(&app, user_id).await?;
        }
    }

    Ok(())
}
