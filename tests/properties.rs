use image::{Rgba, RgbaImage};
use mask_inpaint::{Algorithm, BinaryMask, InpaintOptions, Inpainter, Status};
use proptest::prelude::*;

fn image_from(width: u32, height: u32, seed: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let v = (x.wrapping_mul(73) ^ y.wrapping_mul(151) ^ seed) % 256;
        #[allow(clippy::cast_possible_truncation)]
        let v = v as u8;
        Rgba([v, v.wrapping_add(80), v.wrapping_mul(5), 255])
    })
}

fn algorithm() -> impl Strategy<Value = Algorithm> {
    prop_oneof![
        Just(Algorithm::Texture),
        Just(Algorithm::Diffusion),
        Just(Algorithm::Hybrid),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn empty_mask_is_a_noop(
        width in 1u32..24,
        height in 1u32..24,
        seed in any::<u32>(),
        algo in algorithm(),
        passes in 0u32..6,
    ) {
        let mut img = image_from(width, height, seed);
        let before = img.clone();
        let report = Inpainter::new(InpaintOptions::new(algo, 5, passes))
            .run(&mut img, &BinaryMask::new(width, height))
            .unwrap();
        prop_assert_eq!(report.status, Status::Completed);
        prop_assert_eq!(img, before);
    }

    #[test]
    fn synthesis_fills_every_masked_pixel(
        width in 1u32..20,
        height in 1u32..20,
        seed in any::<u32>(),
        bits in proptest::collection::vec(any::<bool>(), 400),
        hybrid in any::<bool>(),
    ) {
        let len = (width * height) as usize;
        let mask = BinaryMask::from_vec(width, height, bits[..len].to_vec()).unwrap();
        let mut img = image_from(width, height, seed);
        for (x, y, px) in img.enumerate_pixels_mut() {
            if mask.get(x, y) {
                px.0[3] = 0;
            }
        }
        let algo = if hybrid { Algorithm::Hybrid } else { Algorithm::Texture };
        let options = InpaintOptions {
            samples: 30,
            seed: u64::from(seed),
            ..InpaintOptions::new(algo, 3, 2)
        };

        let report = Inpainter::new(options).run(&mut img, &mask).unwrap();
        prop_assert_eq!(report.status, Status::Completed);
        if let Some(synthesis) = report.synthesis {
            prop_assert_eq!(synthesis.remaining, 0);
        }
        prop_assert!(img.pixels().all(|p| p[3] == 255));
    }
}
