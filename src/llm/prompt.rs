use serde::Serialize;

/// Fixed system instructions for the SQL generator. The store schema is
/// hard-coded here on purpose: the model never sees live catalog metadata,
/// only this description.
pub const SYSTEM_PROMPT: &str = r#"
Ты - генератор SQL для DuckDB.
Твоя задача: по русскому вопросу вернуть ОДИН SQL-запрос.

Жесткие правила:
1) Верни только SQL. Без пояснений, без markdown, без ``` и без текста вокруг.
2) Разрешен только SELECT.
3) Запрос должен возвращать ОДНО число (1 строка, 1 колонка). Назови колонку value.
4) Не используй таблицы/поля вне схемы ниже.
5) Даты сравнивай через ::date. Примеры: video_created_at::date, created_at::date
6) creator_id - текст. Всегда сравнивай как строку в кавычках: creator_id = '123'

Схема данных:

Таблица videos:
- id uuid
- creator_id text
- video_created_at timestamptz
- views_count int
- likes_count int
- comments_count int
- reports_count int
- created_at timestamptz
- updated_at timestamptz

Таблица video_snapshots:
- id uuid
- video_id uuid (FK -> videos.id)
- views_count int
- likes_count int
- comments_count int
- reports_count int
- delta_views_count int
- delta_likes_count int
- delta_comments_count int
- delta_reports_count int
- created_at timestamptz (время замера, раз в час)
- updated_at timestamptz

Как считать:
- "сколько всего видео" -> count(*) из videos
- "сколько видео у креатора X вышло с Д1 по Д2 включительно" ->
  count(*) из videos где creator_id='X' и video_created_at::date BETWEEN 'Д1'::date AND 'Д2'::date
- "сколько видео набрало больше N просмотров" -> count(*) из videos где views_count > N
- "на сколько просмотров в сумме выросли все видео ДАТА" ->
  COALESCE(sum(delta_views_count), 0) из video_snapshots где created_at::date='ДАТА'::date
- "сколько разных видео получали новые просмотры ДАТА" ->
  count(distinct video_id) из video_snapshots где created_at::date='ДАТА'::date и delta_views_count > 0

Если спрашивают про лайки/комментарии/жалобы - используй соответствующие поля:
likes_count/delta_likes_count, comments_count/delta_comments_count, reports_count/delta_reports_count.
"#;

/// One role-tagged turn of the completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

impl ChatTurn {
    pub fn system(text: &str) -> Self {
        Self {
            role: "system".to_string(),
            text: text.to_string(),
        }
    }

    pub fn user(text: &str) -> Self {
        Self {
            role: "user".to_string(),
            text: text.to_string(),
        }
    }
}

/// Builds the two-turn conversation sent to the completion endpoint.
/// No validation happens here; safety is enforced after generation.
pub fn build_conversation(question: &str) -> Vec<ChatTurn> {
    vec![
        ChatTurn::system(SYSTEM_PROMPT.trim()),
        ChatTurn::user(question.trim()),
    ]
}
