use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chat::ChatService;
use crate::config::{Config, get_config_dir};
use crate::database::sqlite::Database;
use crate::database::sqlite::models::{
    NewChatSession, NewCourse, NewDocument, NewTopic, NewUser, QuestionType,
};
use crate::database::sqlite::queries::{
    AttemptQueries, ChunkQueries, CourseQueries, DocumentQueries, TopicQueries, UserQueries,
};
use crate::grading::SubmittedAnswer;
use crate::indexer::DocumentIndexer;
use crate::llm::OllamaClient;
use crate::quiz::{QuizGenerationRequest, QuizService};

/// Loaded configuration plus the handles every command needs
pub struct App {
    pub config: Config,
    pub database: Database,
}

impl App {
    #[inline]
    pub async fn open(base_dir: &Path) -> Result<Self> {
        let config = Config::load(base_dir).context("Failed to load configuration")?;
        let database = Database::initialize_from_base_dir(base_dir)
            .await
            .context("Failed to initialize database")?;
        Ok(Self { config, database })
    }

    fn ollama(&self) -> Result<Arc<OllamaClient>> {
        let client = OllamaClient::new(&self.config.ollama).context("Failed to create Ollama client")?;
        Ok(Arc::new(client))
    }

    fn chat_service(&self) -> Result<ChatService> {
        let ollama = self.ollama()?;
        Ok(ChatService::new(
            self.database.clone(),
            Arc::clone(&ollama) as _,
            ollama,
            self.config.retrieval.clone(),
        ))
    }

    fn quiz_service(&self) -> Result<QuizService> {
        Ok(QuizService::new(
            self.database.clone(),
            self.ollama()?,
            self.config.grading.clone(),
        ))
    }
}

/// Resolve `--base-dir` or fall back to `~/.study-assistant`
#[inline]
pub fn resolve_base_dir(base_dir: Option<PathBuf>) -> Result<PathBuf> {
    match base_dir {
        Some(dir) => Ok(dir),
        None => get_config_dir().context("Failed to determine base directory"),
    }
}

/// Create a user, or report the existing one with the same email
#[inline]
pub async fn add_user(app: &App, name: String, email: String) -> Result<()> {
    if let Some(existing) = UserQueries::get_by_email(app.database.pool(), &email).await? {
        println!("User already exists: {} (ID: {})", existing.name, existing.id);
        return Ok(());
    }

    let user = UserQueries::create(app.database.pool(), NewUser { name, email }).await?;
    println!("Created user: {} (ID: {})", user.name, user.id);
    Ok(())
}

#[inline]
pub async fn add_course(
    app: &App,
    user_id: i64,
    title: String,
    description: Option<String>,
) -> Result<()> {
    if UserQueries::get_by_id(app.database.pool(), user_id)
        .await?
        .is_none()
    {
        anyhow::bail!("Unknown user {}", user_id);
    }

    let course = CourseQueries::create(
        app.database.pool(),
        NewCourse {
            user_id,
            title,
            description,
        },
    )
    .await?;
    println!("Created course: {} (ID: {})", course.title, course.id);
    Ok(())
}

#[inline]
pub async fn add_topic(
    app: &App,
    course_id: i64,
    name: String,
    description: Option<String>,
) -> Result<()> {
    if CourseQueries::get_by_id(app.database.pool(), course_id)
        .await?
        .is_none()
    {
        anyhow::bail!("Unknown course {}", course_id);
    }

    let topic = TopicQueries::create(
        app.database.pool(),
        NewTopic {
            course_id,
            name,
            description,
        },
    )
    .await?;
    println!("Created topic: {} (ID: {})", topic.name, topic.id);
    Ok(())
}

/// Read a text file, store it as a document and index it
#[inline]
pub async fn ingest_file(
    app: &App,
    course_id: i64,
    path: &Path,
    title: Option<String>,
) -> Result<()> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let title = title.unwrap_or_else(|| {
        path.file_stem().map_or_else(
            || "Untitled".to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        )
    });
    let file_type = path.extension().map_or_else(
        || "txt".to_string(),
        |ext| ext.to_string_lossy().to_lowercase(),
    );

    let indexer = DocumentIndexer::new(
        app.database.clone(),
        app.ollama()?,
        app.config.retrieval.chunk_size,
    );

    info!("Ingesting {} into course {}", path.display(), course_id);
    let (document, stats) = indexer
        .ingest(NewDocument {
            course_id,
            title,
            file_type,
            extracted_text: Some(text),
            page_count: None,
        })
        .await?;

    println!("{}", style("✓ Document indexed").green());
    println!("  ID: {}", document.id);
    println!("  Title: {}", document.title);
    println!("  Chunks: {}", stats.chunks_created);
    println!("  Embeddings: {}", stats.embeddings_stored);
    Ok(())
}

#[inline]
pub async fn reindex_document(app: &App, document_id: i64) -> Result<()> {
    let indexer = DocumentIndexer::new(
        app.database.clone(),
        app.ollama()?,
        app.config.retrieval.chunk_size,
    );
    let (document, stats) = indexer.reindex(document_id).await?;
    println!(
        "Re-indexed {} (ID: {}): {} chunks",
        document.title, document.id, stats.chunks_created
    );
    Ok(())
}

#[inline]
pub async fn start_session(
    app: &App,
    user_id: i64,
    course_id: Option<i64>,
    document_id: Option<i64>,
    title: Option<String>,
) -> Result<()> {
    let session = app
        .chat_service()?
        .start_session(NewChatSession {
            user_id,
            course_id,
            document_id,
            title: title.unwrap_or_else(|| "New chat".to_string()),
        })
        .await?;
    println!("Started session: {} (ID: {})", session.title, session.id);
    Ok(())
}

/// Post a question to a session and print the reply with its sources
#[inline]
pub async fn ask(app: &App, session_id: i64, question: &str) -> Result<()> {
    let turn = app.chat_service()?.post_message(session_id, question).await?;

    println!("{}", turn.assistant_message.content);

    if !turn.citations.is_empty() {
        println!();
        println!("{}", style("Sources:").bold().yellow());
        for (index, citation) in turn.citations.iter().enumerate() {
            println!(
                "  [{}] {} {}",
                index + 1,
                style(format!("({:.2})", citation.relevance_score)).dim(),
                citation.quote_text
            );
        }
    }
    Ok(())
}

/// Options for `generate-quiz`
#[derive(Debug, Clone)]
pub struct GenerateQuizArgs {
    pub course_id: i64,
    pub user_id: i64,
    pub title: String,
    pub document_id: Option<i64>,
    pub topic_id: Option<i64>,
    pub count: u32,
    pub question_type: QuestionType,
}

#[inline]
pub async fn generate_quiz(app: &App, args: GenerateQuizArgs) -> Result<()> {
    let mut request = QuizGenerationRequest::new(args.course_id, args.user_id, args.title);
    request.document_id = args.document_id;
    request.topic_id = args.topic_id;
    request.question_count = args.count;
    request.question_type = args.question_type;

    let generated = app.quiz_service()?.generate_quiz(request).await?;

    println!(
        "Generated quiz: {} (ID: {})",
        generated.quiz.title, generated.quiz.id
    );
    for item in &generated.items {
        println!(
            "  {}. {} [question {}]",
            item.link.order_index + 1,
            item.question.question_text,
            item.question.id
        );
        for option in &item.options {
            let marker = if option.is_correct { "*" } else { " " };
            println!("     {} {} (option {})", marker, option.option_text, option.id);
        }
    }
    Ok(())
}

#[inline]
pub async fn start_attempt(app: &App, quiz_id: i64, user_id: i64) -> Result<()> {
    let attempt = app.quiz_service()?.start_attempt(quiz_id, user_id).await?;
    println!(
        "Started attempt {} on quiz {} ({} points available)",
        attempt.id, attempt.quiz_id, attempt.total_points
    );
    Ok(())
}

/// Submit answers given as a JSON array, inline or from a file
#[inline]
pub async fn submit_attempt(app: &App, attempt_id: i64, answers: &str) -> Result<()> {
    let raw = if Path::new(answers).is_file() {
        tokio::fs::read_to_string(answers)
            .await
            .with_context(|| format!("Failed to read answers file {}", answers))?
    } else {
        answers.to_string()
    };
    let answers: Vec<SubmittedAnswer> =
        serde_json::from_str(&raw).context("Answers must be a JSON array of submitted answers")?;

    let details = app
        .quiz_service()?
        .submit_attempt(attempt_id, &answers)
        .await?;

    println!(
        "{}",
        style(format!(
            "Score: {} / {} ({:.1}%)",
            details.attempt.score, details.attempt.total_points, details.attempt.percentage
        ))
        .bold()
    );
    for answer in &details.answers {
        let verdict = if answer.is_correct {
            style("correct").green()
        } else {
            style("incorrect").red()
        };
        println!(
            "  Question {}: {} ({} points)",
            answer.question_id, verdict, answer.points_earned
        );
        if let Some(feedback) = &answer.ai_feedback {
            println!("    {}", style(feedback).dim());
        }
    }
    Ok(())
}

/// Show a user's courses, document indexing state, attempts and whether
/// Ollama is reachable
#[inline]
pub async fn show_status(app: &App, user_id: i64) -> Result<()> {
    let pool = app.database.pool();
    let user = UserQueries::get_by_id(pool, user_id)
        .await?
        .with_context(|| format!("Unknown user {}", user_id))?;

    println!("{}", style("📊 Study Assistant Status").bold().cyan());
    println!();

    let client = app.ollama()?;
    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .context("Health check task failed")?;
    match health {
        Ok(()) => println!("🤖 Ollama: {}", style("ready").green()),
        Err(e) => {
            warn!("Ollama health check failed: {:#}", e);
            println!("🤖 Ollama: {} ({})", style("unavailable").red(), e);
        }
    }
    println!();

    println!("👤 {} <{}> (ID: {})", user.name, user.email, user.id);

    let courses = CourseQueries::list_by_user(pool, user.id).await?;
    if courses.is_empty() {
        println!("   No courses yet.");
        println!("   Use 'study-assistant course {} <title>' to create one.", user.id);
    }

    for course in &courses {
        println!();
        println!("{}", style(format!("📚 {} (ID: {})", course.title, course.id)).bold());

        let documents = DocumentQueries::list_by_course(pool, course.id).await?;
        if documents.is_empty() {
            println!("   No documents ingested.");
        }
        for document in &documents {
            let chunks = ChunkQueries::count_by_document(pool, document.id).await?;
            let status = if document.is_completed() {
                style(document.processing_status.to_string()).green()
            } else if document.is_failed() {
                style(document.processing_status.to_string()).red()
            } else {
                style(document.processing_status.to_string()).yellow()
            };
            println!(
                "   📄 {} (ID: {}) - {} - {} chunks",
                document.title, document.id, status, chunks
            );
            if let Some(error) = &document.error_message {
                println!("      Error: {}", error);
            }
        }

        let topics = TopicQueries::list_by_course(pool, course.id).await?;
        for topic in &topics {
            println!("   🏷  {} (ID: {})", topic.name, topic.id);
        }
    }

    let attempts = AttemptQueries::list_by_user(pool, user.id).await?;
    if !attempts.is_empty() {
        println!();
        println!("{}", style("📝 Quiz Attempts").bold());
        for attempt in &attempts {
            if attempt.is_in_progress() {
                println!(
                    "   Attempt {} on quiz {}: {}",
                    attempt.id,
                    attempt.quiz_id,
                    style("in progress").yellow()
                );
            } else {
                println!(
                    "   Attempt {} on quiz {}: {} / {} ({:.1}%)",
                    attempt.id,
                    attempt.quiz_id,
                    attempt.score,
                    attempt.total_points,
                    attempt.percentage
                );
            }
        }
    }

    Ok(())
}
