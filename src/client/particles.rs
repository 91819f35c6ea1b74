//! Item pickup particles
//!
//! Purely visual. Bursts use a hash spread instead of an RNG so replaying a
//! demo reproduces the same sparks.

use glam::Vec3;

/// Maximum live particles
pub const MAX_PARTICLES: usize = 256;

/// Particles per pickup burst
const BURST: u32 = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub p: Vec3,
    pub v: Vec3,
    pub color: [f32; 4],
    /// 0-1, decreases over time
    pub life: f32,
    pub size: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Particles {
    list: Vec<Particle>,
    bursts: u32,
}

impl Particles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.list.clear();
        self.bursts = 0;
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Particle> {
        self.list.iter()
    }

    /// Spray a fountain of particles from `p`
    pub fn burst(&mut self, p: Vec3, color: [f32; 4]) {
        let seed = self.bursts;
        self.bursts = self.bursts.wrapping_add(1);

        for i in 0..BURST {
            if self.list.len() >= MAX_PARTICLES {
                // Oldest go first
                self.list.remove(0);
            }
            let hash = seed
                .wrapping_mul(2654435761)
                .wrapping_add(i.wrapping_mul(7919))
                .wrapping_mul(2246822519);

            let heading = (hash % 1000) as f32 / 1000.0 * std::f32::consts::TAU;
            let rise = 0.5 + (hash / 1000 % 1000) as f32 / 2000.0;
            let speed = 1.0 + (hash / 1_000_000 % 100) as f32 / 100.0;
            let dir = Vec3::new(heading.cos() * (1.0 - rise), rise, heading.sin() * (1.0 - rise));

            self.list.push(Particle {
                p,
                v: dir.normalize_or_zero() * speed,
                color,
                life: 1.0,
                size: 0.02 + (hash / 10_000 % 100) as f32 / 100.0 * 0.03,
            });
        }
    }

    /// Advance every particle under gravity `g`
    pub fn step(&mut self, g: Vec3, dt: f32) {
        for particle in self.list.iter_mut() {
            particle.v += g * dt;
            particle.p += particle.v * dt;
            particle.life -= dt;
        }
        self.list.retain(|p| p.life > 0.0);
    }
}
