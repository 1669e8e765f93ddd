//! Schema generations, applied in order by the migration runner.

/// First generation: identity, catalog, learning paths, progress, telemetry.
/// Usage stats still point at the surrogate `java_errors.id` and interaction
/// types are a closed CHECK list; later generations replace both.
pub const V1_INITIAL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    uid TEXT PRIMARY KEY CHECK (length(uid) BETWEEN 1 AND 36),
    email TEXT NOT NULL UNIQUE COLLATE NOCASE,
    display_name_en TEXT,
    display_name_zh TEXT,
    password TEXT NOT NULL DEFAULT '',
    level_name_en TEXT NOT NULL DEFAULT 'Basic',
    level_name_zh TEXT NOT NULL DEFAULT '基礎',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    reviews_completed INTEGER NOT NULL DEFAULT 0,
    score INTEGER NOT NULL DEFAULT 0,
    last_activity TEXT,
    consecutive_days INTEGER NOT NULL DEFAULT 0,
    total_points INTEGER NOT NULL DEFAULT 0 CHECK (total_points >= 0)
);

CREATE TABLE IF NOT EXISTS error_categories (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    category_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    name_en TEXT NOT NULL,
    name_zh TEXT NOT NULL,
    description_en TEXT,
    description_zh TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS java_errors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    category_id INTEGER NOT NULL,
    error_name_en TEXT NOT NULL,
    description_en TEXT NOT NULL DEFAULT '',
    implementation_guide_en TEXT,
    error_name_zh TEXT NOT NULL,
    description_zh TEXT NOT NULL DEFAULT '',
    implementation_guide_zh TEXT,
    difficulty_level TEXT NOT NULL DEFAULT 'medium' CHECK (difficulty_level IN ('easy', 'medium', 'hard')),
    frequency_weight INTEGER NOT NULL DEFAULT 1 CHECK (frequency_weight >= 0),
    tags TEXT,
    examples TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    usage_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (category_id) REFERENCES error_categories(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS error_details (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_code TEXT NOT NULL UNIQUE COLLATE NOCASE,
    language TEXT NOT NULL DEFAULT 'Java',
    title TEXT NOT NULL,
    detailed_description_md TEXT,
    implementation_guide_md TEXT,
    suggestion_fix_md TEXT,
    example_good_code_md TEXT,
    example_bad_code_md TEXT,
    before_after_comparison_md TEXT,
    common_misconceptions_md TEXT,
    importance_explanation_md TEXT,
    category TEXT NOT NULL DEFAULT '',
    content_language TEXT NOT NULL DEFAULT 'en',
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS badges (
    badge_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    icon TEXT,
    category TEXT,
    difficulty TEXT NOT NULL DEFAULT 'easy' CHECK (difficulty IN ('easy', 'medium', 'hard')),
    points INTEGER NOT NULL DEFAULT 10,
    achievement_category TEXT,
    unlock_criteria TEXT,
    rarity TEXT NOT NULL DEFAULT 'common',
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS user_badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    awarded_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, badge_id),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (badge_id) REFERENCES badges(badge_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS learning_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path_name TEXT NOT NULL,
    description_en TEXT,
    description_zh TEXT,
    difficulty_level TEXT NOT NULL DEFAULT 'Beginner',
    estimated_hours INTEGER NOT NULL DEFAULT 1,
    prerequisites TEXT,
    skills_learned TEXT,
    path_order INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS learning_path_steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path_id INTEGER NOT NULL,
    step_order INTEGER NOT NULL,
    title TEXT NOT NULL,
    description_md TEXT,
    step_type TEXT NOT NULL,
    content_reference TEXT,
    estimated_time_minutes INTEGER NOT NULL DEFAULT 15,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (path_id, step_order),
    FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_learning_paths (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    path_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'not_started' CHECK (status IN ('not_started', 'in_progress', 'completed')),
    current_step_id INTEGER,
    total_steps INTEGER NOT NULL DEFAULT 0,
    progress_percentage REAL NOT NULL DEFAULT 0 CHECK (progress_percentage BETWEEN 0 AND 100),
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT,
    last_accessed TEXT,
    UNIQUE (user_id, path_id),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE,
    FOREIGN KEY (current_step_id) REFERENCES learning_path_steps(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS learning_path_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    path_id INTEGER NOT NULL,
    step_id INTEGER NOT NULL,
    completed_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, step_id),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (path_id) REFERENCES learning_paths(id) ON DELETE CASCADE,
    FOREIGN KEY (step_id) REFERENCES learning_path_steps(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS activity_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    points INTEGER NOT NULL DEFAULT 0,
    details_en TEXT,
    details_zh TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS error_category_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    category TEXT NOT NULL COLLATE NOCASE,
    encountered INTEGER NOT NULL DEFAULT 0,
    identified INTEGER NOT NULL DEFAULT 0,
    mastery_level REAL NOT NULL DEFAULT 0 CHECK (mastery_level BETWEEN 0 AND 1),
    last_updated TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, category),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_sessions (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    language TEXT NOT NULL DEFAULT 'en',
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    ended_at TEXT,
    duration_seconds INTEGER,
    interaction_count INTEGER NOT NULL DEFAULT 0,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_interactions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT,
    interaction_type TEXT NOT NULL CHECK (interaction_type IN (
        'click', 'page_view', 'form_submit', 'tab_switch',
        'code_generation', 'review_submit', 'hint_request', 'error'
    )),
    interaction_category TEXT,
    action TEXT NOT NULL,
    details TEXT,
    time_spent_seconds REAL,
    success INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (session_id) REFERENCES user_sessions(session_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS tab_navigation (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT,
    from_tab TEXT,
    to_tab TEXT NOT NULL,
    time_on_previous_tab_seconds REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (session_id) REFERENCES user_sessions(session_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS practice_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    error_code TEXT NOT NULL COLLATE NOCASE,
    user_session_id TEXT,
    status TEXT NOT NULL DEFAULT 'setup' CHECK (status IN ('setup', 'code_ready', 'review_complete', 'abandoned')),
    generated_code TEXT,
    errors_expected INTEGER NOT NULL DEFAULT 0,
    errors_identified INTEGER NOT NULL DEFAULT 0,
    accuracy_percentage REAL,
    time_spent_seconds INTEGER,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (error_code) REFERENCES java_errors(error_code) ON DELETE CASCADE,
    FOREIGN KEY (user_session_id) REFERENCES user_sessions(session_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS workflow_tracking (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    user_session_id TEXT,
    status TEXT NOT NULL DEFAULT 'in_progress' CHECK (status IN ('in_progress', 'completed', 'abandoned')),
    current_step TEXT NOT NULL DEFAULT 'category_selection' CHECK (current_step IN (
        'category_selection', 'code_generation', 'review', 'feedback'
    )),
    categories TEXT,
    errors_expected INTEGER,
    errors_identified INTEGER,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    completed_at TEXT,
    duration_seconds INTEGER,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (user_session_id) REFERENCES user_sessions(session_id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS error_identification_analysis (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    practice_session_id INTEGER,
    error_code TEXT NOT NULL COLLATE NOCASE,
    category TEXT NOT NULL,
    identified INTEGER NOT NULL DEFAULT 0,
    time_to_identify_seconds INTEGER,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (practice_session_id) REFERENCES practice_sessions(id) ON DELETE CASCADE,
    FOREIGN KEY (error_code) REFERENCES java_errors(error_code) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS error_usage_stats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_id INTEGER NOT NULL,
    user_id TEXT,
    session_id TEXT,
    action_type TEXT NOT NULL CHECK (action_type IN ('viewed', 'practiced', 'mastered', 'failed')),
    context TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (error_id) REFERENCES java_errors(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS system_metrics (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    metric_name TEXT NOT NULL,
    metric_value REAL NOT NULL,
    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS system_alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    alert_type TEXT NOT NULL,
    severity TEXT NOT NULL CHECK (severity IN ('info', 'warning', 'critical')),
    message TEXT NOT NULL,
    metric_value REAL,
    threshold REAL,
    resolved INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    resolved_at TEXT
);

CREATE TABLE IF NOT EXISTS system_performance_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL,
    duration_ms REAL NOT NULL,
    success INTEGER NOT NULL DEFAULT 1,
    details TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS badge_progress_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    current_value INTEGER NOT NULL,
    target_value INTEGER NOT NULL,
    progress_percentage REAL NOT NULL,
    logged_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (badge_id) REFERENCES badges(badge_id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS learning_achievements (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    achievement_type TEXT NOT NULL,
    title_en TEXT NOT NULL,
    title_zh TEXT,
    details TEXT,
    points INTEGER NOT NULL DEFAULT 0,
    achieved_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_java_errors_category ON java_errors(category_id);
CREATE INDEX IF NOT EXISTS idx_path_steps_path ON learning_path_steps(path_id);
CREATE INDEX IF NOT EXISTS idx_user_paths_user ON user_learning_paths(user_id);
CREATE INDEX IF NOT EXISTS idx_path_progress_user ON learning_path_progress(user_id);
CREATE INDEX IF NOT EXISTS idx_activity_user ON activity_log(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_sessions_user ON user_sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_interactions_user ON user_interactions(user_id);
CREATE INDEX IF NOT EXISTS idx_interactions_created ON user_interactions(created_at);
CREATE INDEX IF NOT EXISTS idx_tab_nav_created ON tab_navigation(created_at);
CREATE INDEX IF NOT EXISTS idx_practice_user ON practice_sessions(user_id);
CREATE INDEX IF NOT EXISTS idx_workflow_user ON workflow_tracking(user_id);
CREATE INDEX IF NOT EXISTS idx_identification_user ON error_identification_analysis(user_id);
CREATE INDEX IF NOT EXISTS idx_usage_error ON error_usage_stats(error_id);
CREATE INDEX IF NOT EXISTS idx_metrics_name ON system_metrics(metric_name, recorded_at);
CREATE INDEX IF NOT EXISTS idx_alerts_open ON system_alerts(resolved);
"#;

/// Re-key usage stats by the error_code business key.
pub const V2_BUSINESS_KEY_REFERENCES: &str = r#"
CREATE TABLE error_usage_stats_v2 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    error_code TEXT NOT NULL COLLATE NOCASE,
    user_id TEXT,
    session_id TEXT,
    action_type TEXT NOT NULL CHECK (action_type IN ('viewed', 'practiced', 'mastered', 'failed')),
    context TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (error_code) REFERENCES java_errors(error_code) ON DELETE CASCADE,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE SET NULL
);

INSERT INTO error_usage_stats_v2 (id, error_code, user_id, session_id, action_type, context, created_at)
SELECT s.id, j.error_code, s.user_id, s.session_id, s.action_type, s.context, s.created_at
FROM error_usage_stats s
JOIN java_errors j ON j.id = s.error_id;

DROP TABLE error_usage_stats;
ALTER TABLE error_usage_stats_v2 RENAME TO error_usage_stats;

CREATE INDEX IF NOT EXISTS idx_usage_error_code ON error_usage_stats(error_code);
CREATE INDEX IF NOT EXISTS idx_usage_user ON error_usage_stats(user_id);
"#;

/// Replace the closed interaction_type list with an open registry table.
pub const V3_INTERACTION_TYPE_REGISTRY: &str = r#"
CREATE TABLE interaction_types (
    type_key TEXT PRIMARY KEY COLLATE NOCASE,
    description TEXT,
    builtin INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

INSERT INTO interaction_types (type_key, description, builtin) VALUES
    ('click', 'Generic click', 1),
    ('page_view', 'Page or tab rendered', 1),
    ('form_submit', 'Form submitted', 1),
    ('tab_switch', 'Tab changed', 1),
    ('code_generation', 'Practice code generated', 1),
    ('review_submit', 'Review submitted', 1),
    ('hint_request', 'Hint requested', 1),
    ('error', 'Client-side error', 1);

CREATE TABLE user_interactions_v3 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT,
    interaction_type TEXT NOT NULL COLLATE NOCASE,
    interaction_category TEXT,
    action TEXT NOT NULL,
    details TEXT,
    time_spent_seconds REAL,
    success INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE,
    FOREIGN KEY (session_id) REFERENCES user_sessions(session_id) ON DELETE CASCADE,
    FOREIGN KEY (interaction_type) REFERENCES interaction_types(type_key)
);

INSERT INTO user_interactions_v3
    (id, user_id, session_id, interaction_type, interaction_category, action,
     details, time_spent_seconds, success, created_at)
SELECT id, user_id, session_id, interaction_type, interaction_category, action,
       details, time_spent_seconds, success, created_at
FROM user_interactions;

DROP TABLE user_interactions;
ALTER TABLE user_interactions_v3 RENAME TO user_interactions;

CREATE INDEX IF NOT EXISTS idx_interactions_user ON user_interactions(user_id);
CREATE INDEX IF NOT EXISTS idx_interactions_created ON user_interactions(created_at);
CREATE INDEX IF NOT EXISTS idx_interactions_type ON user_interactions(interaction_type);
"#;

pub const V4_DERIVED_VIEWS: &str = r#"
CREATE VIEW IF NOT EXISTS user_performance_summary AS
SELECT
    u.uid,
    u.email,
    u.display_name_en,
    u.total_points,
    u.reviews_completed,
    u.consecutive_days,
    (SELECT COUNT(*) FROM practice_sessions p WHERE p.user_id = u.uid) AS practice_sessions,
    (SELECT COUNT(*) FROM practice_sessions p
        WHERE p.user_id = u.uid AND p.status = 'review_complete') AS completed_practices,
    (SELECT AVG(p.accuracy_percentage) FROM practice_sessions p
        WHERE p.user_id = u.uid AND p.status = 'review_complete') AS avg_accuracy,
    (SELECT COUNT(*) FROM user_badges b WHERE b.user_id = u.uid) AS badges_earned,
    (SELECT COUNT(*) FROM user_learning_paths l
        WHERE l.user_id = u.uid AND l.status = 'completed') AS paths_completed
FROM users u;

CREATE VIEW IF NOT EXISTS daily_activity_summary AS
SELECT
    date(created_at) AS activity_date,
    COUNT(DISTINCT user_id) AS active_users,
    COUNT(*) AS activities,
    COALESCE(SUM(points), 0) AS points_awarded
FROM activity_log
GROUP BY date(created_at);

CREATE VIEW IF NOT EXISTS badge_progress_summary AS
SELECT
    b.badge_id,
    b.name,
    b.rarity,
    COUNT(ub.id) AS times_awarded,
    CASE
        WHEN (SELECT COUNT(*) FROM users) = 0 THEN 0.0
        ELSE COUNT(ub.id) * 100.0 / (SELECT COUNT(*) FROM users)
    END AS award_rate
FROM badges b
LEFT JOIN user_badges ub ON ub.badge_id = b.badge_id
GROUP BY b.badge_id, b.name, b.rarity;
"#;

/// Per-skill XP ledger, learning sessions and hint usage.
pub const V5_LEARNING_PROGRESS: &str = r#"
CREATE TABLE learning_progress (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    skill_category TEXT NOT NULL COLLATE NOCASE,
    current_level INTEGER NOT NULL DEFAULT 1 CHECK (current_level >= 1),
    experience_points INTEGER NOT NULL DEFAULT 0 CHECK (experience_points >= 0),
    mastery_percentage REAL NOT NULL DEFAULT 0.0
        CHECK (mastery_percentage BETWEEN 0.0 AND 100.0),
    practice_streak INTEGER NOT NULL DEFAULT 0,
    total_practice_minutes INTEGER NOT NULL DEFAULT 0,
    last_practiced TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (user_id, skill_category),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE TABLE learning_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_type TEXT NOT NULL,
    started_at TEXT NOT NULL DEFAULT (datetime('now')),
    ended_at TEXT,
    duration_minutes INTEGER NOT NULL DEFAULT 0,
    activities_completed INTEGER NOT NULL DEFAULT 0,
    performance_score REAL NOT NULL DEFAULT 0.0
        CHECK (performance_score BETWEEN 0.0 AND 100.0),
    session_data TEXT,
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE TABLE hint_usage (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    session_id TEXT NOT NULL,
    error_type TEXT NOT NULL COLLATE NOCASE,
    hint_level INTEGER NOT NULL CHECK (hint_level BETWEEN 1 AND 3),
    helpful INTEGER CHECK (helpful IN (0, 1)),
    used_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (user_id) REFERENCES users(uid) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_learning_sessions_user ON learning_sessions(user_id, started_at);
CREATE INDEX IF NOT EXISTS idx_hint_usage_user ON hint_usage(user_id, error_type, hint_level);
"#;

/// Tables and views a fully migrated database must contain.
pub const REQUIRED_OBJECTS: &[&str] = &[
    "users",
    "error_categories",
    "java_errors",
    "error_details",
    "badges",
    "user_badges",
    "learning_paths",
    "learning_path_steps",
    "user_learning_paths",
    "learning_path_progress",
    "activity_log",
    "error_category_stats",
    "user_sessions",
    "interaction_types",
    "user_interactions",
    "tab_navigation",
    "practice_sessions",
    "workflow_tracking",
    "error_identification_analysis",
    "error_usage_stats",
    "system_metrics",
    "system_alerts",
    "system_performance_logs",
    "badge_progress_logs",
    "learning_achievements",
    "user_performance_summary",
    "daily_activity_summary",
    "badge_progress_summary",
    "learning_progress",
    "learning_sessions",
    "hint_usage",
];

/// Every table holding a `user_id` column that references `users(uid)`.
#[cfg(test)]
pub const USER_OWNED_TABLES: &[&str] = &[
    "user_badges",
    "user_learning_paths",
    "learning_path_progress",
    "activity_log",
    "error_category_stats",
    "user_sessions",
    "user_interactions",
    "tab_navigation",
    "practice_sessions",
    "workflow_tracking",
    "error_identification_analysis",
    "error_usage_stats",
    "badge_progress_logs",
    "learning_achievements",
    "learning_progress",
    "learning_sessions",
    "hint_usage",
];
