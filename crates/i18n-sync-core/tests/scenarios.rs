use async_trait::async_trait;
use i18n_sync_core::chain::{
    ActionChain, ActionStep, ChainManager, ChangeKind, FileType, ProcessingContext, StepFlow,
};
use i18n_sync_core::code::RescanDecision;
use i18n_sync_core::{
    CopyTranslator, FileSystem, MemoryFileSystem, MemoryPersistence, SyncEngine, SyncError,
    TranslateError, TranslationTree, Translator,
};
use i18n_sync_toml::SyncConfig;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const EN: &str = "/project/locales/en/common.json";
const FR: &str = "/project/locales/fr/common.json";

/// Prefixes every text with the target locale and remembers what it was asked.
#[derive(Default)]
struct RecordingTranslator {
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

#[async_trait]
impl Translator for RecordingTranslator {
    async fn translate(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> Result<Vec<String>, TranslateError> {
        self.calls
            .lock()
            .push((target_locale.to_string(), texts.to_vec()));
        Ok(texts
            .iter()
            .map(|text| format!("[{target_locale}] {text}"))
            .collect())
    }
}

fn config() -> SyncConfig {
    let mut config = SyncConfig::new("en", "locales");
    config.po_dir = Some(PathBuf::from("po"));
    config.lock_grace_ms = 500;
    config
}

fn engine(fs: &Arc<MemoryFileSystem>, translator: Arc<dyn Translator>) -> SyncEngine {
    SyncEngine::new(
        config(),
        "/project",
        fs.clone(),
        translator,
        Arc::new(MemoryPersistence::default()),
    )
    .unwrap()
}

fn json_of(fs: &MemoryFileSystem, path: &str) -> Value {
    serde_json::from_str(&fs.get(Path::new(path)).unwrap()).unwrap()
}

#[tokio::test]
async fn scenario_a_propagation_translates_only_missing_values() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(EN, r#"{"a": "hello"}"#);
    fs.insert(FR, r#"{"a": "bonjour", "b": ""}"#);
    let translator = Arc::new(RecordingTranslator::default());
    let engine = engine(&fs, translator.clone());
    engine.initialize().await.unwrap();

    fs.insert(EN, r#"{"a": "hello", "b": "world"}"#);
    assert!(engine.on_change(Path::new(EN)).await.unwrap());

    assert_eq!(
        *translator.calls.lock(),
        vec![("fr".to_string(), vec!["world".to_string()])]
    );
    assert_eq!(json_of(&fs, FR), json!({"a": "bonjour", "b": "[fr] world"}));

    let po = fs.get(Path::new("/project/po/fr/common.po")).unwrap();
    assert!(po.contains("msgid \"b\"\nmsgstr \"[fr] world\""));
    assert!(fs.get(Path::new("/project/po/en/common.po")).is_some());
}

#[tokio::test]
async fn scenario_b_removed_key_forces_full_rescan() {
    let fs = Arc::new(MemoryFileSystem::new());
    let code = Path::new("/project/src/home.tsx");
    fs.insert(code, "t('home.title'); t('home.subtitle');");
    fs.insert(EN, "{}");
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();

    let mut first = ProcessingContext::new(code, ChangeKind::Created);
    engine
        .chains()
        .execute_chain(FileType::Code, &mut first)
        .await
        .unwrap();
    assert_eq!(first.payload.rescan, Some(RescanDecision::Targeted));

    fs.insert(code, "t('home.title');");
    let mut second = ProcessingContext::new(code, ChangeKind::Changed);
    engine
        .chains()
        .execute_chain(FileType::Code, &mut second)
        .await
        .unwrap();

    let changes = second.payload.key_changes.unwrap();
    assert!(changes.has_changes);
    assert!(changes.has_deletions);
    assert!(!changes.has_renames);
    assert_eq!(second.payload.rescan, Some(RescanDecision::Full));
}

/// Lets every pending lock release fire.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(600)).await;
}

#[tokio::test(start_paused = true)]
async fn scenario_b_code_change_updates_resources() {
    let fs = Arc::new(MemoryFileSystem::new());
    let code = Path::new("/project/src/home.tsx");
    fs.insert(code, "t('home.title');");
    fs.insert("/project/locales/en/translation.json", r#"{"home": {"title": "Home", "old": "Old"}}"#);
    fs.insert("/project/locales/fr/translation.json", r#"{"home": {"old": "Vieux"}}"#);
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();

    engine.on_create(code).await.unwrap();
    assert_eq!(
        json_of(&fs, "/project/locales/fr/translation.json"),
        json!({"home": {"old": "Vieux", "title": ""}})
    );

    settle().await;
    fs.remove(code);
    engine.on_delete(code).await.unwrap();
    assert_eq!(
        json_of(&fs, "/project/locales/en/translation.json"),
        json!({"home": {"title": "Home", "old": "Old"}})
    );

    fs.insert(code, "t('home.title'); t('home.old');");
    engine.on_create(code).await.unwrap();
    settle().await;
    fs.insert(code, "t('home.title');");
    engine.on_change(code).await.unwrap();
    assert_eq!(
        json_of(&fs, "/project/locales/en/translation.json"),
        json!({"home": {"title": "Home"}})
    );
    assert_eq!(
        json_of(&fs, "/project/locales/fr/translation.json"),
        json!({"home": {"title": ""}})
    );
}

#[tokio::test(start_paused = true)]
async fn scenario_c_own_writes_are_suppressed_until_grace_elapses() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(EN, r#"{"a": "hello"}"#);
    fs.insert(FR, "{}");
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();
    let services = engine.services();
    let fr = Path::new(FR);

    services.writer.write(fr, "{\"a\": \"salut\"}\n").await.unwrap();
    services.writer.write(fr, "{\"a\": \"salut\"}\n").await.unwrap();
    assert_eq!(services.locks.count(fr), 2);

    assert!(!engine.on_change(fr).await.unwrap());

    tokio::time::sleep(Duration::from_millis(501)).await;
    assert_eq!(services.locks.count(fr), 0);

    // no longer ours: handled as an external edit
    assert!(engine.on_change(fr).await.unwrap());
    assert_eq!(json_of(&fs, EN), json!({"a": "hello"}));
    assert!(fs.get(Path::new("/project/po/fr/common.po")).is_some());
}

struct WriteFile {
    fs: Arc<MemoryFileSystem>,
}

#[async_trait]
impl ActionStep for WriteFile {
    fn name(&self) -> &'static str {
        "write_file"
    }

    async fn execute(&self, ctx: &mut ProcessingContext) -> i18n_sync_core::Result<StepFlow> {
        self.fs
            .write(&ctx.output_path, "written")
            .await
            .map_err(|source| SyncError::Io {
                path: ctx.output_path.clone(),
                source,
            })?;
        Ok(StepFlow::Continue)
    }
}

struct Fail;

#[async_trait]
impl ActionStep for Fail {
    fn name(&self) -> &'static str {
        "fail"
    }

    async fn execute(&self, _ctx: &mut ProcessingContext) -> i18n_sync_core::Result<StepFlow> {
        Err(SyncError::Translate(TranslateError::Provider(
            "provider unavailable".to_string(),
        )))
    }
}

struct Never {
    ran: Arc<Mutex<bool>>,
}

#[async_trait]
impl ActionStep for Never {
    fn name(&self) -> &'static str {
        "never"
    }

    async fn execute(&self, _ctx: &mut ProcessingContext) -> i18n_sync_core::Result<StepFlow> {
        *self.ran.lock() = true;
        Ok(StepFlow::Continue)
    }
}

#[tokio::test]
async fn scenario_d_failing_step_aborts_chain_but_keeps_side_effects() {
    let fs = Arc::new(MemoryFileSystem::new());
    let ran = Arc::new(Mutex::new(false));
    let manager = ChainManager::new();
    let steps: Vec<Box<dyn ActionStep>> = vec![
        Box::new(WriteFile { fs: fs.clone() }),
        Box::new(Fail),
        Box::new(Never { ran: Arc::clone(&ran) }),
    ];
    manager.register_chain(FileType::Translation, ActionChain::new("broken", steps));

    let mut ctx = ProcessingContext::new("/project/out.json", ChangeKind::Changed);
    let result = manager.execute_chain(FileType::Translation, &mut ctx).await;

    assert!(matches!(
        result,
        Err(SyncError::Translate(TranslateError::Provider(_)))
    ));
    assert_eq!(fs.get(Path::new("/project/out.json")).as_deref(), Some("written"));
    assert!(!*ran.lock());
}

#[tokio::test]
async fn po_edit_flows_back_into_json() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(EN, r#"{"greeting": "Hello", "items": [1, 2]}"#);
    fs.insert(FR, r#"{"greeting": "", "items": [1, 2]}"#);
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();

    fs.insert(
        "/project/po/fr/common.po",
        "msgid \"\"\nmsgstr \"\"\n\"Language: fr\\n\"\n\nmsgid \"greeting\"\nmsgstr \"Bonjour\"\n",
    );
    assert!(engine.on_change(Path::new("/project/po/fr/common.po")).await.unwrap());

    assert_eq!(json_of(&fs, FR), json!({"greeting": "Bonjour", "items": [1, 2]}));
    assert_eq!(json_of(&fs, EN), json!({"greeting": "Hello", "items": [1, 2]}));
}

#[tokio::test]
async fn sync_all_fills_every_sibling_and_persists_cache() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(EN, r#"{"a": "A", "nested": {"b": "B"}}"#);
    fs.insert(FR, r#"{"a": "Déjà"}"#);
    fs.insert("/project/locales/de/common.json", "{}");
    let translator = Arc::new(RecordingTranslator::default());
    let engine = engine(&fs, translator);
    engine.initialize().await.unwrap();

    let report = engine.sync_all().await.unwrap();
    assert_eq!(report.sources, 1);
    assert_eq!(report.propagation.updated.len(), 2);

    assert_eq!(
        json_of(&fs, FR),
        json!({"a": "Déjà", "nested": {"b": "[fr] B"}})
    );
    assert_eq!(
        json_of(&fs, "/project/locales/de/common.json"),
        json!({"a": "[de] A", "nested": {"b": "[de] B"}})
    );
    assert_eq!(report.po_files, 3);

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn code_change_keeps_resource_edits_not_yet_processed() {
    let fs = Arc::new(MemoryFileSystem::new());
    let code = Path::new("/project/src/app.js");
    let en = "/project/locales/en/translation.json";
    let fr = "/project/locales/fr/translation.json";
    fs.insert(code, "t('a');");
    fs.insert(en, r#"{"a": "A"}"#);
    fs.insert(fr, r#"{"a": "A fr"}"#);
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();
    engine.on_create(code).await.unwrap();

    // edited by hand; its notification has not arrived yet
    fs.insert(en, r#"{"a": "A", "manual": "User text"}"#);
    fs.insert(code, "t('a'); t('c');");
    engine.on_change(code).await.unwrap();

    assert_eq!(
        json_of(&fs, en),
        json!({"a": "A", "manual": "User text", "c": ""})
    );
    assert_eq!(
        json_of(&fs, fr),
        json!({"a": "A fr", "manual": "User text", "c": ""})
    );
    assert_eq!(
        engine.services().content.get(Path::new(en)),
        Some(TranslationTree::from(json!({"a": "A", "manual": "User text", "c": ""})))
    );
}

#[tokio::test]
async fn po_change_keeps_resource_edits_not_yet_processed() {
    let fs = Arc::new(MemoryFileSystem::new());
    fs.insert(EN, r#"{"greeting": "Hello"}"#);
    fs.insert(FR, r#"{"greeting": ""}"#);
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();

    fs.insert(FR, r#"{"greeting": "", "manual": "Texte"}"#);
    fs.insert(
        "/project/po/fr/common.po",
        "msgid \"\"\nmsgstr \"\"\n\"Language: fr\\n\"\n\nmsgid \"greeting\"\nmsgstr \"Bonjour\"\n",
    );
    assert!(engine.on_change(Path::new("/project/po/fr/common.po")).await.unwrap());

    assert_eq!(json_of(&fs, FR), json!({"greeting": "Bonjour", "manual": "Texte"}));
    assert_eq!(json_of(&fs, EN)["greeting"], json!("Hello"));
}

#[tokio::test(start_paused = true)]
async fn failed_rescan_is_retried_on_the_next_notification() {
    let fs = Arc::new(MemoryFileSystem::new());
    let code = Path::new("/project/src/home.tsx");
    let en = Path::new("/project/locales/en/translation.json");
    fs.insert(code, "t('home.title'); t('home.old');");
    fs.insert(en, r#"{"home": {"title": "Home", "old": "Old"}}"#);
    let engine = engine(&fs, Arc::new(CopyTranslator));
    engine.initialize().await.unwrap();
    engine.on_create(code).await.unwrap();
    settle().await;

    fs.insert(code, "t('home.title');");
    fs.fail_writes_to(en);
    assert!(engine.on_change(code).await.is_err());
    assert_eq!(
        json_of(&fs, "/project/locales/en/translation.json"),
        json!({"home": {"title": "Home", "old": "Old"}})
    );
    assert_eq!(
        engine.services().code_keys.keys_for(code),
        Some(vec!["home.title".to_string(), "home.old".to_string()])
    );

    fs.allow_writes_to(en);
    settle().await;
    assert!(engine.on_change(code).await.unwrap());
    assert_eq!(
        json_of(&fs, "/project/locales/en/translation.json"),
        json!({"home": {"title": "Home"}})
    );
    assert_eq!(
        engine.services().code_keys.keys_for(code),
        Some(vec!["home.title".to_string()])
    );
}
