use std::io::Read;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use narrata_audio::pcm::{Chunk, DataChunk, PcmFormat, SilenceChunk};
use narrata_audio::{AudioError, AudioMediaData, AudioMediaEvent};
use narrata_data::DataProviderManager;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn media(format: PcmFormat) -> AudioMediaData {
    AudioMediaData::new(Arc::new(DataProviderManager::in_memory()), format)
}

fn read(m: &AudioMediaData, begin: Duration, end: Option<Duration>) -> Vec<u8> {
    let mut out = Vec::new();
    m.read(begin, end).unwrap().read_to_end(&mut out).unwrap();
    out
}

fn noise(format: PcmFormat, duration: Duration, seed: u32) -> DataChunk {
    let len = format.time_to_byte_offset(duration) as usize;
    let mut state = seed.wrapping_mul(2_654_435_761).max(1);
    let data = (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            state as u8
        })
        .collect();
    DataChunk::new(format, data)
}

#[test]
fn silence_tone_scenario() {
    let format = PcmFormat::new(44100, 16, 1).unwrap();
    let mut m = media(format);
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    m.subscribe(move |e| sink.lock().unwrap().push(*e));

    let silence = SilenceChunk::new(format, ms(1000));
    assert_eq!(silence.len(), 88_200);
    m.append(&mut silence.reader(), None).unwrap();
    assert_eq!(m.duration(), ms(1000));

    let tone = DataChunk::tone(format, ms(500), 100, 8000);
    m.insert(&mut tone.reader(), ms(500), None).unwrap();
    assert_eq!(m.duration(), ms(1500));
    assert_eq!(read(&m, ms(500), Some(ms(1000))), tone.as_bytes());
    assert!(read(&m, ms(0), Some(ms(500))).iter().all(|&b| b == 0));
    assert!(read(&m, ms(1000), None).iter().all(|&b| b == 0));

    m.remove(ms(0), Some(ms(500))).unwrap();
    assert_eq!(m.duration(), ms(1000));
    let all = m.read_all().unwrap();
    assert_eq!(&all[..44_100], tone.as_bytes());
    assert!(all[44_100..].iter().all(|&b| b == 0));

    assert_eq!(
        events.lock().unwrap().as_slice(),
        &[
            AudioMediaEvent::AudioInserted {
                at: ms(0),
                duration: ms(1000)
            },
            AudioMediaEvent::AudioInserted {
                at: ms(500),
                duration: ms(500)
            },
            AudioMediaEvent::AudioRemoved {
                at: ms(0),
                duration: ms(500)
            },
        ]
    );
}

#[test]
fn appends_add_up() {
    for format in [PcmFormat::CD_MONO, PcmFormat::CD_STEREO, PcmFormat::MONO_22K] {
        let mut m = media(format);
        let mut expected = Duration::ZERO;
        let mut bytes = 0;
        for (i, d) in [10u64, 250, 1, 999, 37].into_iter().enumerate() {
            let chunk = noise(format, ms(d), i as u32);
            expected += m.append(&mut chunk.reader(), None).unwrap();
            bytes += chunk.len();
        }
        assert_eq!(m.duration(), expected);
        assert_eq!(m.pcm_length_in_bytes(), bytes);
    }
}

#[test]
fn insert_then_remove_restores_content() {
    for format in [PcmFormat::CD_MONO, PcmFormat::CD_STEREO, PcmFormat::new(48000, 24, 2).unwrap()] {
        let mut m = media(format);
        m.append(&mut noise(format, ms(200), 1).reader(), None).unwrap();
        m.append(&mut noise(format, ms(300), 2).reader(), None).unwrap();
        let original = m.read_all().unwrap();
        let duration = m.duration();

        for p in [0u64, 3, 199, 200, 201, 377, 500] {
            let d = m
                .insert(&mut noise(format, ms(13), 3).reader(), ms(p), None)
                .unwrap();
            m.remove(ms(p), Some(ms(p) + d)).unwrap();
            assert_eq!(m.duration(), duration, "{format} at {p} ms");
            assert_eq!(m.read_all().unwrap(), original, "{format} at {p} ms");
        }
    }
}

#[test]
fn split_then_merge_restores_content() {
    let format = PcmFormat::CD_STEREO;
    let mut m = media(format);
    m.append(&mut noise(format, ms(120), 1).reader(), None).unwrap();
    m.insert(&mut noise(format, ms(40), 2).reader(), ms(60), None)
        .unwrap();
    let original = m.read_all().unwrap();
    let duration = m.duration();

    for p in [0u64, 1, 59, 60, 61, 99, 100, 159, 160] {
        let mut tail = m.split(ms(p)).unwrap();
        assert_eq!(m.duration() + tail.duration(), duration);
        m.merge_with(&mut tail).unwrap();
        assert!(!tail.has_actual_data());
        assert_eq!(m.duration(), duration);
        assert_eq!(m.read_all().unwrap(), original, "split at {p} ms");
    }
}

#[test]
fn merge_rejects_other_sample_rate() {
    let manager = Arc::new(DataProviderManager::in_memory());
    let mut a = AudioMediaData::new(manager.clone(), PcmFormat::mono16(44100));
    let mut b = AudioMediaData::new(manager, PcmFormat::mono16(22050));
    a.append(&mut noise(a.format(), ms(100), 1).reader(), None)
        .unwrap();
    b.append(&mut noise(b.format(), ms(100), 2).reader(), None)
        .unwrap();
    let (a_bytes, b_bytes) = (a.read_all().unwrap(), b.read_all().unwrap());

    let err = a.merge_with(&mut b).unwrap_err();
    assert!(matches!(err, AudioError::InvalidDataFormat(_)));
    assert_eq!(a.read_all().unwrap(), a_bytes);
    assert_eq!(b.read_all().unwrap(), b_bytes);
}

#[test]
fn remove_everything_empties_clip_list() {
    let format = PcmFormat::CD_MONO;
    let mut m = media(format);
    for i in 0..4 {
        m.append(&mut noise(format, ms(25), i).reader(), None)
            .unwrap();
    }
    m.insert(&mut noise(format, ms(5), 9).reader(), ms(33), None)
        .unwrap();
    let total = m.duration();
    m.remove(Duration::ZERO, Some(total)).unwrap();
    assert!(m.clips().is_empty());
    assert_eq!(m.duration(), Duration::ZERO);
    assert!(m.read_all().unwrap().is_empty());
}

#[test]
fn reads_across_many_clips() {
    let format = PcmFormat::CD_MONO;
    let mut m = media(format);
    let mut expected = Vec::new();
    for i in 0..10 {
        let chunk = noise(format, ms(10), i);
        expected.extend_from_slice(chunk.as_bytes());
        m.append(&mut chunk.reader(), None).unwrap();
    }

    let begin = format.time_to_byte_offset(ms(15)) as usize;
    let end = format.time_to_byte_offset(ms(85)) as usize;
    let stream = m.read(ms(15), Some(ms(85))).unwrap();
    assert_eq!(stream.part_count(), 8);
    assert_eq!(read(&m, ms(15), Some(ms(85))), &expected[begin..end]);
}

#[test]
fn boundary_bytes_stay_frame_aligned() {
    let format = PcmFormat::CD_STEREO;
    let mut m = media(format);
    m.append(&mut noise(format, ms(100), 1).reader(), None)
        .unwrap();
    for p in [1u64, 7, 33, 71] {
        m.insert(&mut noise(format, ms(3), p as u32).reader(), ms(p), None)
            .unwrap();
    }
    for clip in m.clips() {
        let (start, stop) = clip.byte_range();
        assert_eq!(start % 4, 0);
        assert_eq!(stop % 4, 0);
    }
    assert_eq!(m.read_all().unwrap().len() as u64, m.pcm_length_in_bytes());
}
