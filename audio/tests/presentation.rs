use std::fs;
use std::time::Duration;

use narrata_audio::pcm::{Chunk, DataChunk, SilenceChunk};
use narrata_audio::{NoProgress, Presentation, PresentationConfig, StorageConfig};
use narrata_data::{DataError, Storage};

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn file_config() -> PresentationConfig {
    PresentationConfig {
        storage: StorageConfig::File {
            content_dir: "content".into(),
        },
        ..PresentationConfig::default()
    }
}

#[test]
fn file_backed_save_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = Presentation::new(file_config(), Some(dir.path()));
    let format = p.config().default_format;

    let id = p.create_audio_media_data().unwrap();
    let m = p.get_mut(id).unwrap();
    m.append(&mut SilenceChunk::new(format, ms(200)).reader(), None)
        .unwrap();
    m.insert(
        &mut DataChunk::tone(format, ms(50), 40, 1200).reader(),
        ms(120),
        None,
    )
    .unwrap();
    let tail = p.split_media(id, ms(150)).unwrap();

    let files: Vec<_> = fs::read_dir(dir.path().join("content"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(files.len(), 2);
    assert!(files.iter().all(|f| f.ends_with(".wav")));

    let doc_path = dir.path().join("book.json");
    p.save(fs::File::create(&doc_path).unwrap(), &mut NoProgress)
        .unwrap();

    let mut reloaded = Presentation::new(file_config(), Some(dir.path()));
    let ids = reloaded
        .load_into(fs::File::open(&doc_path).unwrap(), &mut NoProgress)
        .unwrap();
    assert_eq!(ids, vec![id, tail]);
    for media in [id, tail] {
        let (a, b) = (p.get(media).unwrap(), reloaded.get(media).unwrap());
        assert_eq!(a.duration(), b.duration());
        assert_eq!(a.read_all().unwrap(), b.read_all().unwrap());
    }
}

#[test]
fn missing_backing_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = Presentation::new(file_config(), Some(dir.path()));
    let id = p.create_audio_media_data().unwrap();
    let format = p.config().default_format;
    p.get_mut(id)
        .unwrap()
        .append(&mut SilenceChunk::new(format, ms(10)).reader(), None)
        .unwrap();

    let mut doc = Vec::new();
    p.save(&mut doc, &mut NoProgress).unwrap();
    fs::remove_dir_all(dir.path().join("content")).unwrap();

    let err = p.get(id).unwrap().read_all().unwrap_err();
    assert!(matches!(
        err,
        narrata_audio::AudioError::Data(DataError::DataIsMissing(_))
    ));

    let mut reloaded = Presentation::new(file_config(), Some(dir.path()));
    let err = reloaded
        .load_into(doc.as_slice(), &mut NoProgress)
        .unwrap_err();
    assert!(matches!(
        err,
        narrata_audio::AudioError::Data(DataError::DataIsMissing(_))
    ));
    assert!(reloaded.media().is_empty());
}

#[test]
fn liveness_sweep_and_relocate() {
    let dir = tempfile::tempdir().unwrap();
    let mut p = Presentation::new(file_config(), Some(dir.path()));
    let format = p.config().default_format;
    let id = p.create_audio_media_data().unwrap();
    {
        let m = p.get_mut(id).unwrap();
        for _ in 0..3 {
            m.append(&mut SilenceChunk::new(format, ms(100)).reader(), None)
                .unwrap();
        }
        m.defragment().unwrap();
    }
    let expected = p.get(id).unwrap().read_all().unwrap();
    assert_eq!(p.data_provider_manager().len(), 4);

    let removed = p.remove_unused_providers(true).unwrap();
    assert_eq!(removed.len(), 3);
    assert_eq!(fs::read_dir(dir.path().join("content")).unwrap().count(), 1);

    let moved = dir.path().join("moved");
    p.relocate(&moved, true).unwrap();
    assert_eq!(
        p.data_provider_manager().storage(),
        Storage::File {
            content_dir: moved.clone()
        }
    );
    assert_eq!(
        p.config().storage,
        StorageConfig::File {
            content_dir: moved.clone()
        }
    );
    assert_eq!(fs::read_dir(&moved).unwrap().count(), 1);
    let left = fs::read_dir(dir.path().join("content")).map_or(0, |d| d.count());
    assert_eq!(left, 0);
    assert_eq!(p.get(id).unwrap().read_all().unwrap(), expected);
}
