//! System prompts for the two collaborator roles.
//!
//! The corpus is Russian, so the prompts are too; the JSON keys and enum values
//! stay in English because the parser matches on them.

/// Mention extraction: one article in, a JSON array of mentions out.
pub const EXTRACT_SYSTEM: &str = r#"Ты получаешь одну статью из "Хазарского словаря" Милорада Павича. Найди в ней всех персонажей и сущности, о которых идёт речь, и верни JSON-массив:

[{ "name": "имя", "aliases": ["другие имена"], "type": "person|historical|mythical|concept", "epoch": "век или даты", "gender": "male|female|unknown", "religion": "христианство|ислам|иудаизм|хазарская вера|unknown", "description": "одно предложение", "quote": "одно предложение из текста статьи" }]

Поля description и quote — коротко, по одному предложению. Если чего-то нет в тексте, ставь "unknown" или пустую строку. Ответ — только JSON, без пояснений и без markdown."#;

/// Bucket merging: several tagged mentions of one entity in, one JSON object out.
pub const MERGE_SYSTEM: &str = r#"Ниже — несколько описаний одного и того же персонажа из разных статей "Хазарского словаря" Милорада Павича. Каждое описание помечено идентификатором статьи в квадратных скобках.

Собери из них одну запись: сохрани все существенные детали и все варианты имени, убери повторы, выбери наиболее точные type, gender и religion. Верни JSON:

{ "name": "...", "aliases": ["..."], "type": "person|historical|mythical|concept", "epoch": "...", "gender": "male|female|unknown", "religion": "...", "description": "..." }

Ответ — только JSON, без пояснений и без markdown."#;
